use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;
use smallvec::SmallVec;

/// One dependency-list element. Primitives compare by value; everything
/// else is an `Rc` compared by identity, so a freshly allocated container
/// over unchanged fields counts as changed.
#[derive(Clone)]
pub enum Dep {
	Unit,
	Bool(bool),
	Int(i64),
	Uint(u64),
	Float(u64),
	Str(Rc<str>),
	Ref(Rc<dyn Any>),
}

pub type Deps = SmallVec<[Dep; 4]>;

impl PartialEq for Dep {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Dep::Unit, Dep::Unit) => true,
			(Dep::Bool(a), Dep::Bool(b)) => a == b,
			(Dep::Int(a), Dep::Int(b)) => a == b,
			(Dep::Uint(a), Dep::Uint(b)) => a == b,
			(Dep::Float(a), Dep::Float(b)) => a == b,
			(Dep::Str(a), Dep::Str(b)) => a == b,
			(Dep::Ref(a), Dep::Ref(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl From<()> for Dep {
	fn from(_: ()) -> Self {
		Dep::Unit
	}
}

impl From<bool> for Dep {
	fn from(value: bool) -> Self {
		Dep::Bool(value)
	}
}

impl From<i32> for Dep {
	fn from(value: i32) -> Self {
		Dep::Int(value as i64)
	}
}

impl From<i64> for Dep {
	fn from(value: i64) -> Self {
		Dep::Int(value)
	}
}

impl From<u32> for Dep {
	fn from(value: u32) -> Self {
		Dep::Uint(value as u64)
	}
}

impl From<u64> for Dep {
	fn from(value: u64) -> Self {
		Dep::Uint(value)
	}
}

impl From<usize> for Dep {
	fn from(value: usize) -> Self {
		Dep::Uint(value as u64)
	}
}

impl From<f32> for Dep {
	fn from(value: f32) -> Self {
		Dep::Float((value as f64).to_bits())
	}
}

impl From<f64> for Dep {
	fn from(value: f64) -> Self {
		Dep::Float(value.to_bits())
	}
}

impl From<&str> for Dep {
	fn from(value: &str) -> Self {
		Dep::Str(Rc::from(value))
	}
}

impl From<String> for Dep {
	fn from(value: String) -> Self {
		Dep::Str(Rc::from(value.as_str()))
	}
}

impl From<Rc<str>> for Dep {
	fn from(value: Rc<str>) -> Self {
		Dep::Str(value)
	}
}

impl<T: Any> From<Rc<T>> for Dep {
	fn from(value: Rc<T>) -> Self {
		Dep::Ref(value)
	}
}

/// Per-owner cache of memoized slots. An owner embeds one of these; the
/// (owner, property) key of the source design becomes (cache instance,
/// slot name).
pub struct MemoCache {
	inner: RefCell<FxHashMap<&'static str, MemoEntry>>,
}

struct MemoEntry {
	value: Rc<dyn Any>,
	deps: Deps,
	ref_count: i64,
}

impl Default for MemoCache {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoCache {
	pub fn new() -> Self {
		MemoCache {
			inner: RefCell::new(FxHashMap::default()),
		}
	}

	/// Cache-or-recompute for the slot `name`. The cached value is reused,
	/// same `Rc`, as long as the dependency list compares equal (length
	/// plus positional equality). Otherwise `compute` runs exactly once and
	/// the slot is overwritten in place, keeping its reference count.
	///
	/// No cell borrow is held across `deps_fn` or `compute`, so a compute
	/// may read other slots of the same cache.
	pub fn read<O, T: 'static>(
		&self,
		owner: &O,
		name: &'static str,
		deps_fn: impl FnOnce(&O) -> Deps,
		compute: impl FnOnce(&O) -> T,
	) -> Rc<T> {
		let next_deps = deps_fn(owner);
		{
			let inner = self.inner.borrow();
			if let Some(entry) = inner.get(name) {
				if entry.deps == next_deps {
					return Self::downcast(name, entry.value.clone());
				}
			}
		}
		let value = Rc::new(compute(owner));
		let mut inner = self.inner.borrow_mut();
		match inner.get_mut(name) {
			Some(entry) => {
				entry.value = value.clone();
				entry.deps = next_deps;
			}
			None => {
				tracing::trace!(slot = name, "memo slot created");
				inner.insert(
					name,
					MemoEntry {
						value: value.clone(),
						deps: next_deps,
						ref_count: 0,
					},
				);
			}
		}
		value
	}

	/// Ties the slot's lifetime to an active observer. No-op for a slot
	/// that was never read.
	pub fn track(&self, name: &'static str) {
		if let Some(entry) = self.inner.borrow_mut().get_mut(name) {
			entry.ref_count += 1;
		}
	}

	/// Drops the slot entirely once its reference count reaches zero; the
	/// next read recomputes from a cold cache.
	pub fn untrack(&self, name: &'static str) {
		let mut inner = self.inner.borrow_mut();
		if let Some(entry) = inner.get_mut(name) {
			entry.ref_count -= 1;
			if entry.ref_count <= 0 {
				tracing::trace!(slot = name, "memo slot reclaimed");
				inner.remove(name);
			}
		}
	}

	pub fn contains(&self, name: &'static str) -> bool {
		self.inner.borrow().contains_key(name)
	}

	/// Dispose-owner: drops every slot at once.
	pub fn clear(&self) {
		self.inner.borrow_mut().clear();
	}

	fn downcast<T: 'static>(name: &'static str, value: Rc<dyn Any>) -> Rc<T> {
		match value.downcast::<T>() {
			Ok(value) => value,
			Err(_) => panic!("memo slot `{}` was read with a different result type", name),
		}
	}
}

/// Bound accessor for one memoized slot: the slot name plus the functions
/// computing its dependency list and its value from the owner.
pub struct Memo<O, T> {
	name: &'static str,
	deps: Box<dyn Fn(&O) -> Deps>,
	compute: Box<dyn Fn(&O) -> T>,
}

impl<O, T: 'static> Memo<O, T> {
	pub fn new(
		name: &'static str,
		deps: Box<dyn Fn(&O) -> Deps>,
		compute: Box<dyn Fn(&O) -> T>,
	) -> Self {
		Memo {
			name,
			deps,
			compute,
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn get(&self, owner: &O, cache: &MemoCache) -> Rc<T> {
		cache.read(
			owner,
			self.name,
			|owner| (self.deps)(owner),
			|owner| (self.compute)(owner),
		)
	}

	pub fn track(&self, cache: &MemoCache) {
		cache.track(self.name)
	}

	pub fn untrack(&self, cache: &MemoCache) {
		cache.untrack(self.name)
	}
}
