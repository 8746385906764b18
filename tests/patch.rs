use rewind::patch::{apply, diff};
use rewind::{PatchError, PatchOp, Pointer};
use serde_json::json;

#[test]
fn pointer_display_and_parse_round_trip() {
	let pointer: Pointer = "/a~1b/x~0y/0".parse().unwrap();
	assert_eq!(pointer.tokens(), ["a/b", "x~y", "0"]);
	assert_eq!(pointer.to_string(), "/a~1b/x~0y/0");

	let root: Pointer = "".parse().unwrap();
	assert!(root.is_root());

	assert!("missing-slash".parse::<Pointer>().is_err());
}

#[test]
fn op_wire_format_matches_json_patch() {
	let op = PatchOp::Replace {
		path: "/count".parse().unwrap(),
		value: json!(3),
	};
	assert_eq!(
		serde_json::to_value(&op).unwrap(),
		json!({"op": "replace", "path": "/count", "value": 3})
	);

	let parsed: PatchOp =
		serde_json::from_value(json!({"op": "remove", "path": "/items/0"})).unwrap();
	assert_eq!(
		parsed,
		PatchOp::Remove {
			path: "/items/0".parse().unwrap(),
		}
	);
}

#[test]
fn diff_round_trips_nested_objects() {
	let before = json!({"user": {"name": "ada", "age": 36}, "tags": ["a"]});
	let after = json!({"user": {"name": "ada", "age": 37, "admin": true}, "tags": ["a", "b"]});

	let (forward, inverse) = diff(&before, &after);
	let mut patched = before.clone();
	apply(&mut patched, &forward).unwrap();
	assert_eq!(patched, after);
	apply(&mut patched, &inverse).unwrap();
	assert_eq!(patched, before);
}

#[test]
fn diff_round_trips_array_shrinkage() {
	let before = json!({"items": [1, 2, 3, 4]});
	let after = json!({"items": [1, 9]});

	let (forward, inverse) = diff(&before, &after);
	let mut patched = before.clone();
	apply(&mut patched, &forward).unwrap();
	assert_eq!(patched, after);
	apply(&mut patched, &inverse).unwrap();
	assert_eq!(patched, before);
}

#[test]
fn diff_replaces_on_type_change() {
	let before = json!({"value": 1});
	let after = json!({"value": {"nested": true}});

	let (forward, inverse) = diff(&before, &after);
	assert_eq!(
		forward[..],
		[PatchOp::Replace {
			path: "/value".parse().unwrap(),
			value: json!({"nested": true}),
		}]
	);

	let mut patched = before.clone();
	apply(&mut patched, &forward).unwrap();
	assert_eq!(patched, after);
	apply(&mut patched, &inverse).unwrap();
	assert_eq!(patched, before);
}

#[test]
fn add_appends_with_the_dash_token() {
	let mut doc = json!({"items": [1, 2]});
	apply(
		&mut doc,
		&[PatchOp::Add {
			path: "/items/-".parse().unwrap(),
			value: json!(3),
		}],
	)
	.unwrap();
	assert_eq!(doc, json!({"items": [1, 2, 3]}));
}

#[test]
fn apply_reports_unresolvable_paths() {
	let mut doc = json!({"a": 1});
	let err = apply(
		&mut doc,
		&[PatchOp::Remove {
			path: "/missing".parse().unwrap(),
		}],
	)
	.unwrap_err();
	assert!(matches!(err, PatchError::PathNotFound(_)));

	let err = apply(
		&mut doc,
		&[PatchOp::Remove {
			path: "".parse().unwrap(),
		}],
	)
	.unwrap_err();
	assert!(matches!(err, PatchError::RemoveRoot));

	let mut doc = json!({"items": [1]});
	let err = apply(
		&mut doc,
		&[PatchOp::Replace {
			path: "/items/5".parse().unwrap(),
			value: json!(0),
		}],
	)
	.unwrap_err();
	assert!(matches!(err, PatchError::OutOfBounds { .. }));

	let err = apply(
		&mut doc,
		&[PatchOp::Add {
			path: "/items/x".parse().unwrap(),
			value: json!(0),
		}],
	)
	.unwrap_err();
	assert!(matches!(err, PatchError::BadIndex { .. }));

	let err = apply(
		&mut doc,
		&[PatchOp::Replace {
			path: "/items/0/deep".parse().unwrap(),
			value: json!(0),
		}],
	)
	.unwrap_err();
	assert!(matches!(err, PatchError::NotAContainer(_)));
}
