use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::patch::PatchOp;
use crate::produce::Produce;
use crate::store::Store;

#[derive(Debug, Error)]
pub enum HistoryError {
	#[error("history requires a store constructed with `enable_patch`")]
	PatchesDisabled,
}

#[derive(Clone, Debug)]
pub struct HistoryOptions {
	/// Bound on the entry list; the oldest entry is evicted from the front
	/// once exceeded.
	pub max_length: usize,
	/// Mutations recorded within this window merge into one entry. Also the
	/// length of the suppression window after an undo/redo replay.
	pub debounce_time: Duration,
}

impl Default for HistoryOptions {
	fn default() -> Self {
		HistoryOptions {
			max_length: 30,
			debounce_time: Duration::from_millis(100),
		}
	}
}

/// One coalesced undo unit. Forward batches append at the end, inverse
/// batches prepend at the front, so one undo replays `inverse_patches` in
/// list order against progressively older states.
struct HistoryEntry {
	patches: Vec<Vec<PatchOp>>,
	inverse_patches: Vec<Vec<PatchOp>>,
}

/// Records every patch-producing commit of a store into a bounded,
/// debounced, navigable log. Cheap to clone; dropping the last handle
/// detaches the recording hook.
pub struct History<T: Produce> {
	body: Rc<HistoryBody<T>>,
}

impl<T: Produce> Clone for History<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct HistoryBody<T: Produce> {
	store: Store<T>,
	max_length: usize,
	debounce_time: Duration,
	clock: Rc<dyn Clock>,
	hook: Cell<u64>,
	inner: RefCell<HistoryInner>,
}

struct HistoryInner {
	entries: Vec<HistoryEntry>,
	/// Index of the most recently applied entry; entries after it are redo
	/// candidates.
	cursor: Option<usize>,
	/// Whether the entry at the cursor still accepts merged batches.
	open: bool,
	deadline: Option<Instant>,
	keep_record: bool,
	prevent_until: Option<Instant>,
}

impl<T: Produce> History<T> {
	pub fn new(store: &Store<T>, options: HistoryOptions) -> Result<Self, HistoryError> {
		Self::with_clock(store, options, Rc::new(SystemClock))
	}

	pub fn with_clock(
		store: &Store<T>,
		options: HistoryOptions,
		clock: Rc<dyn Clock>,
	) -> Result<Self, HistoryError> {
		if !store.patches_enabled() {
			return Err(HistoryError::PatchesDisabled);
		}
		let body = Rc::new(HistoryBody {
			store: store.clone(),
			max_length: options.max_length.max(1),
			debounce_time: options.debounce_time,
			clock,
			hook: Cell::new(0),
			inner: RefCell::new(HistoryInner {
				entries: Vec::new(),
				cursor: None,
				open: false,
				deadline: None,
				keep_record: false,
				prevent_until: None,
			}),
		});
		let hook = store.on_patch({
			let body = Rc::downgrade(&body);
			move |patches, inverse| {
				if let Some(body) = body.upgrade() {
					body.record(patches, inverse);
				}
			}
		});
		body.hook.set(hook);
		Ok(History { body })
	}

	/// Reverts the entry at the cursor by replaying its inverse batches
	/// through the store, then steps the cursor back. Returns `false` when
	/// there is nothing to undo.
	pub fn undo(&self) -> bool {
		let batches = {
			let now = self.body.clock.now();
			let mut inner = self.body.inner.borrow_mut();
			inner.close();
			let cursor = match inner.cursor {
				Some(cursor) => cursor,
				None => return false,
			};
			inner.prevent_until = Some(now + self.body.debounce_time);
			inner.cursor = cursor.checked_sub(1);
			inner.entries[cursor].inverse_patches.clone()
		};
		tracing::debug!(batches = batches.len(), "undo");
		for batch in &batches {
			if let Err(err) = self.body.store.apply_patches(batch) {
				panic!(
					"undo replay failed, the store value was modified outside the store: {}",
					err
				);
			}
		}
		true
	}

	/// Re-applies the entry after the cursor. Returns `false` when there is
	/// nothing to redo.
	pub fn redo(&self) -> bool {
		let batches = {
			let now = self.body.clock.now();
			let mut inner = self.body.inner.borrow_mut();
			inner.close();
			let next = inner.cursor.map_or(0, |cursor| cursor + 1);
			if next >= inner.entries.len() {
				return false;
			}
			inner.prevent_until = Some(now + self.body.debounce_time);
			inner.cursor = Some(next);
			inner.entries[next].patches.clone()
		};
		tracing::debug!(batches = batches.len(), "redo");
		for batch in &batches {
			if let Err(err) = self.body.store.apply_patches(batch) {
				panic!(
					"redo replay failed, the store value was modified outside the store: {}",
					err
				);
			}
		}
		true
	}

	/// `true` pins the open entry so mutations keep merging into it
	/// regardless of elapsed time, for multi-step gestures; `false` resumes
	/// debounce-driven closing from now.
	pub fn keep_record(&self, keep: bool) {
		let mut inner = self.body.inner.borrow_mut();
		inner.keep_record = keep;
		if keep {
			inner.deadline = None;
		} else if inner.open {
			inner.deadline = Some(self.body.clock.now() + self.body.debounce_time);
		}
	}

	/// Drops the whole log. The store value is untouched.
	pub fn clear(&self) {
		let mut inner = self.body.inner.borrow_mut();
		inner.entries.clear();
		inner.cursor = None;
		inner.close();
	}

	pub fn can_undo(&self) -> bool {
		self.body.inner.borrow().cursor.is_some()
	}

	pub fn can_redo(&self) -> bool {
		let inner = self.body.inner.borrow();
		inner.cursor.map_or(0, |cursor| cursor + 1) < inner.entries.len()
	}

	pub fn len(&self) -> usize {
		self.body.inner.borrow().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T: Produce> HistoryBody<T> {
	fn record(&self, patches: &[PatchOp], inverse: &[PatchOp]) {
		if patches.is_empty() && inverse.is_empty() {
			return;
		}
		let now = self.clock.now();
		let mut inner = self.inner.borrow_mut();
		if inner.prevent_until.map_or(false, |until| now < until) {
			// Hard deadline armed by undo/redo: batches produced by replay
			// must not become undoable themselves.
			tracing::trace!("record suppressed inside the replay guard");
			return;
		}
		inner.prevent_until = None;
		if inner.open
			&& !inner.keep_record
			&& inner.deadline.map_or(true, |deadline| now >= deadline)
		{
			inner.close();
		}
		match (inner.open, inner.cursor) {
			(true, Some(cursor)) => {
				let entry = &mut inner.entries[cursor];
				entry.patches.push(patches.to_vec());
				entry.inverse_patches.insert(0, inverse.to_vec());
			}
			_ => {
				// Any new recording invalidates the redo stack.
				let keep = inner.cursor.map_or(0, |cursor| cursor + 1);
				inner.entries.truncate(keep);
				while inner.entries.len() >= self.max_length {
					tracing::trace!("history entry evicted");
					inner.entries.remove(0);
				}
				inner.entries.push(HistoryEntry {
					patches: vec![patches.to_vec()],
					inverse_patches: vec![inverse.to_vec()],
				});
				inner.cursor = Some(inner.entries.len() - 1);
				inner.open = true;
			}
		}
		inner.deadline = if inner.keep_record {
			None
		} else {
			Some(now + self.debounce_time)
		};
	}
}

impl HistoryInner {
	fn close(&mut self) {
		self.open = false;
		self.deadline = None;
	}
}

impl<T: Produce> Drop for HistoryBody<T> {
	fn drop(&mut self) {
		self.store.remove_patch_hook(self.hook.get());
	}
}
