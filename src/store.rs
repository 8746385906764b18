use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;

use crate::patch::{PatchError, PatchOp};
use crate::produce::Produce;

const ACTION_UPDATE: &str = "update";
const ACTION_REPLAY: &str = "replay";
const ACTION_REPLACE: &str = "replace";
const ACTION_RESET: &str = "reset";

#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
	/// Must be set for any patch-dependent feature (history, time travel)
	/// to function. Off by default to keep plain stores diff-free.
	pub enable_patch: bool,
}

pub struct MutateOptions<'a> {
	/// Free-form label forwarded to commit hooks for display purposes.
	pub action: Option<&'a str>,
	/// Invoked with the forward/inverse patch lists of this mutation,
	/// after the registered patch hooks and before listener notification.
	pub patch_callback: Option<&'a mut dyn FnMut(&[PatchOp], &[PatchOp])>,
}

impl Default for MutateOptions<'_> {
	fn default() -> Self {
		MutateOptions {
			action: None,
			patch_callback: None,
		}
	}
}

/// Owner of the current value. Cheap to clone; all clones share one body.
pub struct Store<T: Produce> {
	body: Rc<StoreBody<T>>,
}

impl<T: Produce> Clone for Store<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct StoreBody<T: Produce> {
	value: RefCell<Rc<T>>,
	initial: Rc<T>,
	enable_patch: bool,
	inner: RefCell<StoreInner<T>>,
}

struct StoreInner<T> {
	listeners: FxHashMap<u64, Rc<dyn Fn(&T, &T)>>,
	patch_hooks: Vec<(u64, Rc<dyn Fn(&[PatchOp], &[PatchOp])>)>,
	commit_hooks: Vec<(u64, Rc<dyn Fn(&str, &T)>)>,
	next_id: u64,
}

impl<T: Produce> Store<T> {
	pub fn new(value: T) -> Self {
		Self::with_options(value, StoreOptions::default())
	}

	pub fn with_options(value: T, options: StoreOptions) -> Self {
		let initial = Rc::new(value);
		Store {
			body: Rc::new(StoreBody {
				value: RefCell::new(initial.clone()),
				initial,
				enable_patch: options.enable_patch,
				inner: RefCell::new(StoreInner {
					listeners: FxHashMap::default(),
					patch_hooks: Vec::new(),
					commit_hooks: Vec::new(),
					next_id: 0,
				}),
			}),
		}
	}

	/// Snapshot of the currently committed value.
	pub fn get(&self) -> Rc<T> {
		self.body.value.borrow().clone()
	}

	/// The construction-time value.
	pub fn initial(&self) -> Rc<T> {
		self.body.initial.clone()
	}

	pub fn patches_enabled(&self) -> bool {
		self.body.enable_patch
	}

	pub fn mutate(&self, recipe: impl FnOnce(&mut T)) -> Result<(), PatchError> {
		self.mutate_with(MutateOptions::default(), recipe)
	}

	pub fn mutate_named(&self, action: &str, recipe: impl FnOnce(&mut T)) -> Result<(), PatchError> {
		self.mutate_with(
			MutateOptions {
				action: Some(action),
				patch_callback: None,
			},
			recipe,
		)
	}

	/// The mutation entry point. Runs `recipe` over a draft of the current
	/// value, commits the result, then feeds patch hooks, the per-call
	/// patch callback, listeners and commit hooks, in that order. If the
	/// recipe panics or patch production fails, no commit happens and no
	/// listener or hook runs.
	pub fn mutate_with(
		&self,
		options: MutateOptions<'_>,
		recipe: impl FnOnce(&mut T),
	) -> Result<(), PatchError> {
		let action = options.action.unwrap_or(ACTION_UPDATE);
		let prev = self.get();
		if self.body.enable_patch {
			let (next, patches, inverse) = prev.produce_with_patches(recipe)?;
			let next = Rc::new(next);
			self.body.commit(next.clone());
			self.body.run_patch_hooks(&patches, &inverse);
			if let Some(callback) = options.patch_callback {
				callback(&patches, &inverse);
			}
			self.body.notify(&next, &prev);
			self.body.run_commit_hooks(action, &next);
		} else {
			let next = Rc::new(prev.produce(recipe));
			self.body.commit(next.clone());
			self.body.notify(&next, &prev);
			self.body.run_commit_hooks(action, &next);
		}
		Ok(())
	}

	/// Replays a patch list against the current value, bypassing recipes
	/// and per-call patch callbacks. This is the history engine's replay
	/// path; patches are expected to come from a previous recording or a
	/// trusted debugger.
	pub fn apply_patches(&self, ops: &[PatchOp]) -> Result<(), PatchError> {
		let prev = self.get();
		let (next, inverse) = prev.replay(ops)?;
		let next = Rc::new(next);
		self.body.commit(next.clone());
		self.body.run_patch_hooks(ops, &inverse);
		self.body.notify(&next, &prev);
		self.body.run_commit_hooks(ACTION_REPLAY, &next);
		Ok(())
	}

	pub fn replace(&self, value: T) {
		self.replace_named(ACTION_REPLACE, value)
	}

	/// Wholesale commit of an externally supplied value. Listeners and
	/// commit hooks fire as for any mutation; patch hooks do not, so an
	/// attached history log is left untouched.
	pub fn replace_named(&self, action: &str, value: T) {
		let prev = self.get();
		let next = Rc::new(value);
		self.body.commit(next.clone());
		self.body.notify(&next, &prev);
		self.body.run_commit_hooks(action, &next);
	}

	pub fn reset(&self) {
		self.replace_named(ACTION_RESET, (*self.body.initial).clone());
	}

	/// Registers `listener`, called `(new, prev)` on every commit. A
	/// listener registered during a notification is not called for the
	/// in-flight commit.
	pub fn subscribe(&self, listener: impl Fn(&T, &T) + 'static) -> Subscription<T> {
		let mut inner = self.body.inner.borrow_mut();
		let id = inner.next_id();
		inner.listeners.insert(id, Rc::new(listener));
		Subscription {
			body: Rc::downgrade(&self.body),
			id,
		}
	}

	pub fn on_patch(&self, hook: impl Fn(&[PatchOp], &[PatchOp]) + 'static) -> u64 {
		let mut inner = self.body.inner.borrow_mut();
		let id = inner.next_id();
		inner.patch_hooks.push((id, Rc::new(hook)));
		id
	}

	pub fn remove_patch_hook(&self, id: u64) {
		self.body
			.inner
			.borrow_mut()
			.patch_hooks
			.retain(|(hook, _)| *hook != id);
	}

	pub fn on_commit(&self, hook: impl Fn(&str, &T) + 'static) -> u64 {
		let mut inner = self.body.inner.borrow_mut();
		let id = inner.next_id();
		inner.commit_hooks.push((id, Rc::new(hook)));
		id
	}

	pub fn remove_commit_hook(&self, id: u64) {
		self.body
			.inner
			.borrow_mut()
			.commit_hooks
			.retain(|(hook, _)| *hook != id);
	}
}

impl<T: Produce> StoreBody<T> {
	fn commit(&self, next: Rc<T>) {
		*self.value.borrow_mut() = next;
	}

	fn notify(&self, next: &T, prev: &T) {
		// Snapshot, so listeners registered mid-notification wait for the
		// next commit and unsubscribing is safe while notifying.
		let listeners: Vec<Rc<dyn Fn(&T, &T)>> =
			self.inner.borrow().listeners.values().cloned().collect();
		for listener in listeners {
			(*listener)(next, prev);
		}
	}

	fn run_patch_hooks(&self, patches: &[PatchOp], inverse: &[PatchOp]) {
		let hooks: Vec<_> = self
			.inner
			.borrow()
			.patch_hooks
			.iter()
			.map(|(_, hook)| hook.clone())
			.collect();
		for hook in hooks {
			(*hook)(patches, inverse);
		}
	}

	fn run_commit_hooks(&self, action: &str, next: &T) {
		tracing::trace!(action, "commit");
		let hooks: Vec<_> = self
			.inner
			.borrow()
			.commit_hooks
			.iter()
			.map(|(_, hook)| hook.clone())
			.collect();
		for hook in hooks {
			(*hook)(action, next);
		}
	}
}

impl<T> StoreInner<T> {
	fn next_id(&mut self) -> u64 {
		self.next_id += 1;
		self.next_id
	}
}

/// Removal handle returned by [`Store::subscribe`]. Dropping it does not
/// unsubscribe.
pub struct Subscription<T: Produce> {
	body: Weak<StoreBody<T>>,
	id: u64,
}

impl<T: Produce> Subscription<T> {
	/// Idempotent; a handle whose store is gone is a no-op.
	pub fn unsubscribe(&self) {
		if let Some(body) = self.body.upgrade() {
			body.inner.borrow_mut().listeners.remove(&self.id);
		}
	}
}
