//! A hashmap shared between threads behind one lock.
//!
//! [`LockMap`] is a single open addressing table guarded by a single mutex.
//! Every operation takes the lock, does a bounded amount of work on the table
//! and releases it again, so all operations are linearizable. Readers are
//! serialized like writers.
//!
//! A few operations run caller code while the lock is held: the scoped
//! accessors ([`LockMap::with_value`], [`LockMap::with_value_or_else`]), the
//! transforms ([`LockMap::compute`], [`LockMap::try_compute`]) and the lock
//! holding references ([`Ref`], [`RefMut`], [`Entry`]). That code must be
//! short and must not touch the same map again, doing so deadlocks.

mod alloc;
mod compute;
mod error;
mod lock;
pub mod mapref;
mod table;


pub use compute::Action;
pub use error::KeyNotFound;
pub use mapref::entry::{Entry, OccupiedEntry, VacantEntry};
pub use mapref::one::{Ref, RefMut};

use core::borrow::Borrow;
use core::convert::Infallible;
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use crossbeam_utils::CachePadded;
use lock::{Mutex, MutexGuard};
use std::collections::hash_map::RandomState;
use table::{normalize, RawTable};

/// Capacity used by [`LockMap::new`].
pub const DEFAULT_CAPACITY: usize = 64;

/// An open addressing hashmap protected by a single mutex.
///
/// The capacity is always a power of two and doubles whenever an insertion
/// would push the load factor above 3/4. Deleted slots are compacted on the
/// spot instead of leaving tombstones behind.
pub struct LockMap<K, V, S = RandomState> {
    table: CachePadded<Mutex<RawTable<K, V>>>,
    hasher: S,
}

impl<K: Eq + Hash, V, S: BuildHasher + Default> Default for LockMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> LockMap<K, V, RandomState> {
    /// Creates a new map with a capacity of [`DEFAULT_CAPACITY`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let reviews = LockMap::new();
    /// reviews.insert("Veloren", "What a fantastic game!");
    /// ```
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, RandomState::new())
    }

    /// Creates a new map with the given number of slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let numbers = LockMap::with_capacity(2);
    /// numbers.insert(2, 4);
    /// numbers.insert(8, 16);
    /// assert_eq!(numbers.get_required(&8), Ok(16));
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> LockMap<K, V, S> {
    /// Creates a new map with a capacity of [`DEFAULT_CAPACITY`] and the
    /// provided hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hasher)
    }

    /// Creates a new map with the given number of slots and the provided
    /// hasher.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let table = RawTable::with_capacity(capacity);
        tracing::trace!(capacity, "created lockmap");

        Self {
            table: CachePadded::new(Mutex::new(table)),
            hasher,
        }
    }

    /// Returns a reference to the map's [`BuildHasher`].
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Removes every entry. The capacity is kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, RawTable<K, V>> {
        self.table.lock()
    }
}

impl<K: Eq + Hash, V, S: BuildHasher> LockMap<K, V, S> {
    fn hash_u64<T: ?Sized + Hash>(&self, item: &T) -> u64 {
        let mut hasher = self.hasher.build_hasher();

        item.hash(&mut hasher);

        normalize(hasher.finish())
    }

    /// Inserts a key and a value, returning the previous value if the key
    /// was already present. The stored key is not replaced in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let map = LockMap::new();
    /// assert_eq!(map.insert("I am the key!", "And I am the value!"), None);
    /// assert_eq!(map.insert("I am the key!", "Another value"), Some("And I am the value!"));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let mut table = self.lock();
        let hash = self.hash_u64(&key);

        table.insert(hash, key, value)
    }

    /// Inserts a key and a value without checking whether the key is
    /// already present.
    ///
    /// Inserting a key twice stores two entries for it. Lookups then find
    /// whichever comes first on the probe path, and each removal takes out
    /// one of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let map = LockMap::new();
    /// map.add("k", 1);
    /// map.add("k", 2);
    /// assert_eq!(map.len(), 2);
    ///
    /// map.remove("k");
    /// assert!(map.contains_key("k"));
    /// map.remove("k");
    /// assert!(!map.contains_key("k"));
    /// ```
    pub fn add(&self, key: K, value: V) {
        let mut table = self.lock();
        let hash = self.hash_u64(&key);

        table.insert_new(hash, key, value);
    }

    /// Removes an entry, returning its value if it existed.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes an entry, returning the stored key and value if it existed.
    pub fn remove_entry<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut table = self.lock();
        let hash = self.hash_u64(key);
        let idx = table.find(hash, key)?;

        Some(table.remove_at(idx))
    }

    /// Get an immutable reference to an entry in the map.
    ///
    /// The map stays locked for as long as the reference lives.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let youtubers = LockMap::new();
    /// youtubers.insert("Bosnian Bill", 457000);
    /// assert_eq!(*youtubers.get("Bosnian Bill").unwrap(), 457000);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<Ref<'_, K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let table = self.lock();
        let hash = self.hash_u64(key);
        let idx = table.find(hash, key)?;

        Some(Ref::new(table, idx))
    }

    /// Get a mutable reference to an entry in the map.
    ///
    /// The map stays locked for as long as the reference lives.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let class = LockMap::new();
    /// class.insert("Albin", 15);
    /// *class.get_mut("Albin").unwrap() -= 1;
    /// assert_eq!(*class.get("Albin").unwrap(), 14);
    /// ```
    pub fn get_mut<Q>(&self, key: &Q) -> Option<RefMut<'_, K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let table = self.lock();
        let hash = self.hash_u64(key);
        let idx = table.find(hash, key)?;

        Some(RefMut::new(table, idx))
    }

    /// Returns a copy of the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyNotFound`] if the key is absent.
    pub fn get_required<Q>(&self, key: &Q) -> Result<V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        let table = self.lock();
        let hash = self.hash_u64(key);

        match table.find(hash, key) {
            Some(idx) => Ok(table.value(idx).clone()),
            None => Err(KeyNotFound),
        }
    }

    /// Checks if the map contains a specific key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let table = self.lock();
        let hash = self.hash_u64(key);

        table.find(hash, key).is_some()
    }

    /// Advanced entry API that tries to mimic `std::collections::HashMap`.
    /// See the documentation on `lockmap::mapref::entry` for more details.
    ///
    /// The map stays locked for as long as the entry lives.
    pub fn entry(&self, key: K) -> Entry<'_, K, V> {
        let table = self.lock();
        let hash = self.hash_u64(&key);

        match table.find(hash, &key) {
            Some(idx) => Entry::Occupied(OccupiedEntry::new(table, idx, key)),
            None => Entry::Vacant(VacantEntry::new(table, hash, key)),
        }
    }

    /// Returns a mutable reference to the value for `key`, inserting
    /// `default` first if the key is absent.
    pub fn get_or_insert(&self, key: K, default: V) -> RefMut<'_, K, V> {
        self.entry(key).or_insert(default)
    }

    /// Like [`get_or_insert`](Self::get_or_insert), but the value is only
    /// built when the key is absent.
    pub fn get_or_insert_with(&self, key: K, default: impl FnOnce() -> V) -> RefMut<'_, K, V> {
        self.entry(key).or_insert_with(default)
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), but building
    /// the value may fail. The error is returned as is and the map is left
    /// unchanged.
    pub fn try_get_or_insert_with<E>(
        &self,
        key: K,
        default: impl FnOnce() -> Result<V, E>,
    ) -> Result<RefMut<'_, K, V>, E> {
        self.entry(key).or_try_insert_with(default)
    }

    /// Inserts `value` if `key` is absent. Returns whether the key was
    /// already present.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let seen = LockMap::new();
    /// assert!(!seen.contains_or_insert("x", ()));
    /// assert!(seen.contains_or_insert("x", ()));
    /// ```
    pub fn contains_or_insert(&self, key: K, value: V) -> bool {
        match self.entry(key) {
            Entry::Occupied(_) => true,
            Entry::Vacant(entry) => {
                entry.insert(value);
                false
            }
        }
    }

    /// Runs `f` on the value stored for `key`, in place and under the lock.
    ///
    /// Returns `None` without calling `f` if the key is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::LockMap;
    ///
    /// let stock = LockMap::new();
    /// stock.insert("apples", 3);
    /// assert_eq!(stock.with_value("apples", |n| { *n -= 1; *n }), Some(2));
    /// assert_eq!(stock.with_value("pears", |n| *n), None);
    /// ```
    pub fn with_value<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut table = self.lock();
        let hash = self.hash_u64(key);
        let idx = table.find(hash, key)?;

        Some(f(table.value_mut(idx)))
    }

    /// Runs `present` on the value stored for `key`, or `absent` if there is
    /// none. Either runs under the lock.
    pub fn with_value_or_else<Q, R>(
        &self,
        key: &Q,
        present: impl FnOnce(&mut V) -> R,
        absent: impl FnOnce() -> R,
    ) -> R
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut table = self.lock();
        let hash = self.hash_u64(key);

        match table.find(hash, key) {
            Some(idx) => present(table.value_mut(idx)),
            None => absent(),
        }
    }

    /// Atomically transforms the entry for `key`.
    ///
    /// `f` is called exactly once with the stored key and value, or with
    /// `key` and `None` if the key is absent. What it returns is the result
    /// of this call. With [`Action::Delete`] the entry is removed. With
    /// [`Action::Keep`] a returned value is stored, inserting the key if
    /// needed, and `None` leaves the map alone.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockmap::{Action, LockMap};
    ///
    /// let hits = LockMap::new();
    /// let bump = |_: &&str, n: Option<&u32>| (Some(n.map_or(1, |n| n + 1)), Action::Keep);
    /// assert_eq!(hits.compute("/", bump), Some(1));
    /// assert_eq!(hits.compute("/", bump), Some(2));
    ///
    /// assert_eq!(hits.compute("/", |_, n| (n.copied(), Action::Delete)), Some(2));
    /// assert!(hits.is_empty());
    /// ```
    pub fn compute<F>(&self, key: K, f: F) -> Option<V>
    where
        V: Clone,
        F: FnOnce(&K, Option<&V>) -> (Option<V>, Action),
    {
        match self.try_compute(key, |k, v| Ok::<_, Infallible>(f(k, v))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`compute`](Self::compute), but the transform may fail.
    ///
    /// The transform runs before anything is written, an error is returned
    /// as is and leaves the map unchanged.
    pub fn try_compute<E, F>(&self, key: K, f: F) -> Result<Option<V>, E>
    where
        V: Clone,
        F: FnOnce(&K, Option<&V>) -> Result<(Option<V>, Action), E>,
    {
        let mut table = self.lock();
        let hash = self.hash_u64(&key);
        let found = table.find(hash, &key);

        let (value, action) = match found {
            Some(idx) => {
                let (stored, current) = table.pair(idx);
                f(stored, Some(current))?
            }
            None => f(&key, None)?,
        };

        match (action, found) {
            (Action::Delete, Some(idx)) => {
                table.remove_at(idx);
            }
            (Action::Delete, None) => {}
            (Action::Keep, Some(idx)) => {
                if let Some(value) = &value {
                    *table.value_mut(idx) = value.clone();
                }
            }
            (Action::Keep, None) => {
                if let Some(value) = &value {
                    table.insert_new(hash, key, value.clone());
                }
            }
        }

        Ok(value)
    }
}

impl<K, V, S> fmt::Debug for LockMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();

        f.debug_struct("LockMap")
            .field("len", &table.len())
            .field("capacity", &table.capacity())
            .finish()
    }
}
