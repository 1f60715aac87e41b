use super::one::RefMut;
use crate::lock::MutexGuard;
use crate::table::RawTable;
use core::mem;

/// A view into a single key of the map, taken while holding its lock.
pub enum Entry<'a, K, V> {
    Occupied(OccupiedEntry<'a, K, V>),
    Vacant(VacantEntry<'a, K, V>),
}

impl<'a, K: Eq, V> Entry<'a, K, V> {
    /// Apply a function to the stored value if it exists.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());

                Entry::Occupied(entry)
            }

            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Get the key of the entry.
    pub fn key(&self) -> &K {
        match *self {
            Entry::Occupied(ref entry) => entry.key(),
            Entry::Vacant(ref entry) => entry.key(),
        }
    }

    /// Into the key of the entry.
    pub fn into_key(self) -> K {
        match self {
            Entry::Occupied(entry) => entry.into_key(),
            Entry::Vacant(entry) => entry.into_key(),
        }
    }

    /// Return a mutable reference to the element if it exists,
    /// otherwise insert the default and return a mutable reference to that.
    pub fn or_default(self) -> RefMut<'a, K, V>
    where
        V: Default,
    {
        match self {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => entry.insert(V::default()),
        }
    }

    /// Return a mutable reference to the element if it exists,
    /// otherwise a provided value and return a mutable reference to that.
    pub fn or_insert(self, value: V) -> RefMut<'a, K, V> {
        match self {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    /// Return a mutable reference to the element if it exists,
    /// otherwise insert the result of a provided function and return a mutable reference to that.
    pub fn or_insert_with(self, value: impl FnOnce() -> V) -> RefMut<'a, K, V> {
        match self {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => entry.insert(value()),
        }
    }

    /// Like [`or_insert_with`], but the value may fail to build. On failure
    /// nothing is written and the error is returned as is.
    ///
    /// [`or_insert_with`]: Entry::or_insert_with
    pub fn or_try_insert_with<E>(
        self,
        value: impl FnOnce() -> Result<V, E>,
    ) -> Result<RefMut<'a, K, V>, E> {
        match self {
            Entry::Occupied(entry) => Ok(entry.into_ref()),
            Entry::Vacant(entry) => Ok(entry.insert(value()?)),
        }
    }

    /// Sets the value of the entry, and returns a reference to the inserted value.
    pub fn insert(self, value: V) -> RefMut<'a, K, V> {
        match self {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                entry.into_ref()
            }
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    /// Sets the value of the entry, and returns an OccupiedEntry.
    ///
    /// If you are not interested in the occupied entry,
    /// consider [`insert`] as it doesn't need to clone the key.
    ///
    /// [`insert`]: Entry::insert
    pub fn insert_entry(self, value: V) -> OccupiedEntry<'a, K, V>
    where
        K: Clone,
    {
        match self {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                entry
            }
            Entry::Vacant(entry) => entry.insert_entry(value),
        }
    }
}

pub struct VacantEntry<'a, K, V> {
    guard: MutexGuard<'a, RawTable<K, V>>,
    hash: u64,
    key: K,
}

impl<'a, K: Eq, V> VacantEntry<'a, K, V> {
    pub(crate) fn new(guard: MutexGuard<'a, RawTable<K, V>>, hash: u64, key: K) -> Self {
        Self { guard, hash, key }
    }

    /// Writes the entry, growing the table first if it is too full.
    pub fn insert(self, value: V) -> RefMut<'a, K, V> {
        let Self {
            mut guard,
            hash,
            key,
        } = self;

        let idx = guard.insert_new(hash, key, value);
        RefMut::new(guard, idx)
    }

    /// Sets the value of the entry with the VacantEntry’s key, and returns an OccupiedEntry.
    pub fn insert_entry(self, value: V) -> OccupiedEntry<'a, K, V>
    where
        K: Clone,
    {
        let Self {
            mut guard,
            hash,
            key,
        } = self;

        let idx = guard.insert_new(hash, key.clone(), value);
        OccupiedEntry::new(guard, idx, key)
    }

    pub fn into_key(self) -> K {
        self.key
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

pub struct OccupiedEntry<'a, K, V> {
    guard: MutexGuard<'a, RawTable<K, V>>,
    idx: usize,
    key: K,
}

impl<'a, K: Eq, V> OccupiedEntry<'a, K, V> {
    pub(crate) fn new(guard: MutexGuard<'a, RawTable<K, V>>, idx: usize, key: K) -> Self {
        Self { guard, idx, key }
    }

    pub fn get(&self) -> &V {
        self.guard.value(self.idx)
    }

    pub fn get_mut(&mut self) -> &mut V {
        self.guard.value_mut(self.idx)
    }

    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    pub fn into_ref(self) -> RefMut<'a, K, V> {
        RefMut::new(self.guard, self.idx)
    }

    /// The key used to look the entry up, which may differ from the stored one.
    pub fn into_key(self) -> K {
        self.key
    }

    /// The key stored in the map.
    pub fn key(&self) -> &K {
        self.guard.key(self.idx)
    }

    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    pub fn remove_entry(mut self) -> (K, V) {
        self.guard.remove_at(self.idx)
    }
}
