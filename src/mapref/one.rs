use crate::lock::MutexGuard;
use crate::table::RawTable;
use core::ops::{Deref, DerefMut};
use std::fmt::{Debug, Formatter};

/// A shared reference to an entry.
///
/// Holds the map's lock until dropped, every other operation on the map
/// blocks in the meantime.
pub struct Ref<'a, K, V> {
    guard: MutexGuard<'a, RawTable<K, V>>,
    idx: usize,
}

impl<'a, K, V> Ref<'a, K, V> {
    pub(crate) fn new(guard: MutexGuard<'a, RawTable<K, V>>, idx: usize) -> Self {
        Self { guard, idx }
    }

    pub fn key(&self) -> &K {
        self.guard.key(self.idx)
    }

    pub fn value(&self) -> &V {
        self.guard.value(self.idx)
    }

    pub fn pair(&self) -> (&K, &V) {
        self.guard.pair(self.idx)
    }
}

impl<K: Debug, V: Debug> Debug for Ref<'_, K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (k, v) = self.pair();
        f.debug_struct("Ref")
            .field("key", k)
            .field("value", v)
            .finish()
    }
}

impl<K, V> Deref for Ref<'_, K, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.value()
    }
}

/// A mutable reference to an entry, aliasing the slot in place.
///
/// Writes through it are visible to the map immediately. The lock is held
/// until the reference is dropped, so the map must not be used from the
/// holding thread in the meantime or it will deadlock.
pub struct RefMut<'a, K, V> {
    guard: MutexGuard<'a, RawTable<K, V>>,
    idx: usize,
}

impl<'a, K, V> RefMut<'a, K, V> {
    pub(crate) fn new(guard: MutexGuard<'a, RawTable<K, V>>, idx: usize) -> Self {
        Self { guard, idx }
    }

    pub fn key(&self) -> &K {
        self.guard.key(self.idx)
    }

    pub fn value(&self) -> &V {
        self.guard.value(self.idx)
    }

    pub fn value_mut(&mut self) -> &mut V {
        self.guard.value_mut(self.idx)
    }

    pub fn pair(&self) -> (&K, &V) {
        self.guard.pair(self.idx)
    }

    pub fn pair_mut(&mut self) -> (&K, &mut V) {
        self.guard.pair_mut(self.idx)
    }

    pub fn downgrade(self) -> Ref<'a, K, V> {
        Ref::new(self.guard, self.idx)
    }
}

impl<K: Debug, V: Debug> Debug for RefMut<'_, K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (k, v) = self.pair();
        f.debug_struct("RefMut")
            .field("key", k)
            .field("value", v)
            .finish()
    }
}

impl<K, V> Deref for RefMut<'_, K, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.value()
    }
}

impl<K, V> DerefMut for RefMut<'_, K, V> {
    fn deref_mut(&mut self) -> &mut V {
        self.value_mut()
    }
}
