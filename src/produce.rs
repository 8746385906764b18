use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::patch::{self, PatchError, PatchOp};

/// The immutable-update boundary the store consumes: edit a draft clone of
/// a value, get the next value back, optionally with patches describing the
/// edit. Implemented for every serde-able `Clone` type via JSON snapshots.
pub trait Produce: Clone + 'static {
	/// Applies `recipe` to a draft of `self` and returns the edited value.
	/// `self` is never mutated; a panicking recipe unwinds before any
	/// result exists.
	fn produce(&self, recipe: impl FnOnce(&mut Self)) -> Self
	where
		Self: Sized,
	{
		let mut draft = self.clone();
		recipe(&mut draft);
		draft
	}

	/// Like [`Produce::produce`], additionally returning forward and
	/// inverse patch lists describing the edit.
	fn produce_with_patches(
		&self,
		recipe: impl FnOnce(&mut Self),
	) -> Result<(Self, Vec<PatchOp>, Vec<PatchOp>), PatchError>
	where
		Self: Sized;

	/// Replays a recorded patch list, returning the next value together
	/// with the inverse list for the applied ops.
	fn replay(&self, ops: &[PatchOp]) -> Result<(Self, Vec<PatchOp>), PatchError>
	where
		Self: Sized;
}

impl<T> Produce for T
where
	T: Clone + Serialize + DeserializeOwned + 'static,
{
	fn produce_with_patches(
		&self,
		recipe: impl FnOnce(&mut Self),
	) -> Result<(Self, Vec<PatchOp>, Vec<PatchOp>), PatchError> {
		let before = serde_json::to_value(self)?;
		let mut draft = self.clone();
		recipe(&mut draft);
		let after = serde_json::to_value(&draft)?;
		let (forward, inverse) = patch::diff(&before, &after);
		Ok((draft, forward, inverse))
	}

	fn replay(&self, ops: &[PatchOp]) -> Result<(Self, Vec<PatchOp>), PatchError> {
		let before = serde_json::to_value(self)?;
		let mut after = before.clone();
		patch::apply(&mut after, ops)?;
		let (_, inverse) = patch::diff(&before, &after);
		Ok((serde_json::from_value(after)?, inverse))
	}
}
