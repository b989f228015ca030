//! Single-assignment memo cells.
//!
//! A [`Memo`] starts empty and accepts exactly one value. Reads take a shared
//! lock, the first write takes the exclusive lock, and every later write is a
//! no-op. Concurrent generations for several documents of one event share the
//! same cells, so a lazily fetched fact is stored once and read many times.

use parking_lot::RwLock;

#[derive(Debug)]
pub struct Memo<T> {
  value: RwLock<Option<T>>,
}

impl<T> Default for Memo<T> {
  fn default() -> Self {
    Self {
      value: RwLock::new(None),
    }
  }
}

impl<T: Clone> Memo<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a copy of the stored value, if any.
  pub fn get(&self) -> Option<T> {
    self.value.read().clone()
  }

  pub fn is_set(&self) -> bool {
    self.value.read().is_some()
  }

  /// Stores `value` unless a value is already present.
  ///
  /// Returns `true` when this call stored the value.
  pub fn set(&self, value: T) -> bool {
    let mut slot = self.value.write();
    if slot.is_some() {
      return false;
    }
    *slot = Some(value);
    true
  }

  /// Returns the stored value, computing and storing it with `init` first if
  /// the cell is empty.
  ///
  /// The lock is not held while `init` runs. When two callers race, both may
  /// compute a value but only the first one is kept, and both observe it.
  pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    if let Some(value) = self.get() {
      return Ok(value);
    }
    let value = init()?;
    self.set(value.clone());
    Ok(self.get().unwrap_or(value))
  }
}
