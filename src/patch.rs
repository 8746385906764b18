use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
	#[error("path `{0}` does not resolve")]
	PathNotFound(String),
	#[error("index {index} out of bounds at `{path}` (len {len})")]
	OutOfBounds {
		path: String,
		index: usize,
		len: usize,
	},
	#[error("cannot traverse `{0}` through a non-container value")]
	NotAContainer(String),
	#[error("invalid array index `{token}` at `{path}`")]
	BadIndex { path: String, token: String },
	#[error("cannot remove the document root")]
	RemoveRoot,
	#[error(transparent)]
	Codec(#[from] serde_json::Error),
}

/// Location of an edit inside a JSON tree. Displays, parses and serializes
/// as an RFC 6901 pointer string, so recorded patches stay readable by
/// JSON-Patch tooling.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pointer(Vec<String>);

impl Pointer {
	pub fn root() -> Self {
		Pointer(Vec::new())
	}

	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}

	pub fn tokens(&self) -> &[String] {
		&self.0
	}

	pub fn push(&mut self, token: impl Into<String>) {
		self.0.push(token.into())
	}

	fn child(&self, token: impl Into<String>) -> Self {
		let mut next = self.clone();
		next.push(token);
		next
	}
}

impl fmt::Display for Pointer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for token in &self.0 {
			write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
		}
		Ok(())
	}
}

impl FromStr for Pointer {
	type Err = PatchError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		if raw.is_empty() {
			return Ok(Pointer::root());
		}
		if !raw.starts_with('/') {
			return Err(PatchError::PathNotFound(raw.to_string()));
		}
		Ok(Pointer(
			raw.split('/')
				.skip(1)
				.map(|token| token.replace("~1", "/").replace("~0", "~"))
				.collect(),
		))
	}
}

impl Serialize for Pointer {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Pointer {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(D::Error::custom)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
	Add { path: Pointer, value: Value },
	Replace { path: Pointer, value: Value },
	Remove { path: Pointer },
}

impl PatchOp {
	pub fn path(&self) -> &Pointer {
		match self {
			PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
				path
			}
		}
	}
}

/// Replays `ops` in order against `target`.
pub fn apply(target: &mut Value, ops: &[PatchOp]) -> Result<(), PatchError> {
	for op in ops {
		apply_one(target, op)?;
	}
	Ok(())
}

fn apply_one(target: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
	let path = op.path();
	let tokens = path.tokens();
	match op {
		PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } if tokens.is_empty() => {
			*target = value.clone();
			Ok(())
		}
		PatchOp::Remove { .. } if tokens.is_empty() => Err(PatchError::RemoveRoot),
		PatchOp::Add { value, .. } => {
			let last = &tokens[tokens.len() - 1];
			let parent = resolve_mut(target, path, &tokens[..tokens.len() - 1])?;
			match parent {
				Value::Object(map) => {
					map.insert(last.clone(), value.clone());
					Ok(())
				}
				Value::Array(items) => {
					let len = items.len();
					let index = if last == "-" {
						len
					} else {
						parse_index(path, last)?
					};
					if index > len {
						return Err(PatchError::OutOfBounds {
							path: path.to_string(),
							index,
							len,
						});
					}
					items.insert(index, value.clone());
					Ok(())
				}
				_ => Err(PatchError::NotAContainer(path.to_string())),
			}
		}
		PatchOp::Replace { value, .. } => {
			let slot = resolve_mut(target, path, tokens)?;
			*slot = value.clone();
			Ok(())
		}
		PatchOp::Remove { .. } => {
			let last = &tokens[tokens.len() - 1];
			let parent = resolve_mut(target, path, &tokens[..tokens.len() - 1])?;
			match parent {
				Value::Object(map) => match map.remove(last.as_str()) {
					Some(_) => Ok(()),
					None => Err(PatchError::PathNotFound(path.to_string())),
				},
				Value::Array(items) => {
					let len = items.len();
					let index = parse_index(path, last)?;
					if index >= len {
						return Err(PatchError::OutOfBounds {
							path: path.to_string(),
							index,
							len,
						});
					}
					items.remove(index);
					Ok(())
				}
				_ => Err(PatchError::NotAContainer(path.to_string())),
			}
		}
	}
}

fn resolve_mut<'a>(
	root: &'a mut Value,
	path: &Pointer,
	tokens: &[String],
) -> Result<&'a mut Value, PatchError> {
	let mut current = root;
	for token in tokens {
		current = match current {
			Value::Object(map) => map
				.get_mut(token)
				.ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
			Value::Array(items) => {
				let len = items.len();
				let index = parse_index(path, token)?;
				items.get_mut(index).ok_or_else(|| PatchError::OutOfBounds {
					path: path.to_string(),
					index,
					len,
				})?
			}
			_ => return Err(PatchError::NotAContainer(path.to_string())),
		};
	}
	Ok(current)
}

fn parse_index(path: &Pointer, token: &str) -> Result<usize, PatchError> {
	token.parse().map_err(|_| PatchError::BadIndex {
		path: path.to_string(),
		token: token.to_string(),
	})
}

/// Structural diff of two JSON trees. Returns forward ops turning `before`
/// into `after` and inverse ops turning `after` back into `before`.
pub fn diff(before: &Value, after: &Value) -> (Vec<PatchOp>, Vec<PatchOp>) {
	let mut forward = Vec::new();
	let mut inverse = Vec::new();
	diff_value(&Pointer::root(), before, after, &mut forward, &mut inverse);
	(forward, inverse)
}

fn diff_value(
	path: &Pointer,
	before: &Value,
	after: &Value,
	forward: &mut Vec<PatchOp>,
	inverse: &mut Vec<PatchOp>,
) {
	if before == after {
		return;
	}
	match (before, after) {
		(Value::Object(b), Value::Object(a)) => {
			for (key, prev) in b {
				let child = path.child(key.clone());
				match a.get(key) {
					Some(next) => diff_value(&child, prev, next, forward, inverse),
					None => {
						forward.push(PatchOp::Remove {
							path: child.clone(),
						});
						inverse.push(PatchOp::Add {
							path: child,
							value: prev.clone(),
						});
					}
				}
			}
			for (key, next) in a {
				if !b.contains_key(key) {
					let child = path.child(key.clone());
					forward.push(PatchOp::Add {
						path: child.clone(),
						value: next.clone(),
					});
					inverse.push(PatchOp::Remove { path: child });
				}
			}
		}
		(Value::Array(b), Value::Array(a)) => {
			let shared = b.len().min(a.len());
			for index in 0..shared {
				diff_value(
					&path.child(index.to_string()),
					&b[index],
					&a[index],
					forward,
					inverse,
				);
			}
			// Tail removals run highest index first so earlier ops never
			// shift the indices of later ones.
			for index in shared..a.len() {
				forward.push(PatchOp::Add {
					path: path.child(index.to_string()),
					value: a[index].clone(),
				});
			}
			for index in (shared..a.len()).rev() {
				inverse.push(PatchOp::Remove {
					path: path.child(index.to_string()),
				});
			}
			for index in (shared..b.len()).rev() {
				forward.push(PatchOp::Remove {
					path: path.child(index.to_string()),
				});
			}
			for index in shared..b.len() {
				inverse.push(PatchOp::Add {
					path: path.child(index.to_string()),
					value: b[index].clone(),
				});
			}
		}
		_ => {
			forward.push(PatchOp::Replace {
				path: path.clone(),
				value: after.clone(),
			});
			inverse.push(PatchOp::Replace {
				path: path.clone(),
				value: before.clone(),
			});
		}
	}
}
