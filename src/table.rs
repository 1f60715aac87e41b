//! The open addressing engine.
//!
//! Entries live directly in a power-of-two sized slot array and collisions are
//! resolved by linear probing: `j, j + 1, j + 2, ...` modulo the capacity.
//! Every slot caches the hash of its key, so growth relocates entries without
//! hashing again and deletion can recompute home slots while compacting.
//!
//! There are no tombstones. Removal shifts later members of the cluster back
//! into the hole so that a probe may always stop at the first vacant slot.
//!
//! Nothing here is synchronised, the table is only ever reached through the
//! map's mutex.

use crate::alloc::{Slot, SlotArray, EMPTY};
use core::borrow::Borrow;
use core::mem;
use core::ptr;

/// Set on every cached hash so that no key ever hashes to `EMPTY`.
const HASH_BIT: u64 = 1 << 63;

// Grow before an insertion would push the load above 3/4.
const LOAD_FACTOR_NUM: usize = 3;
const LOAD_FACTOR_DEN: usize = 4;

/// Turns a raw hash into the form stored in a slot.
#[inline]
pub(crate) fn normalize(hash: u64) -> u64 {
    hash | HASH_BIT
}

/// Number of probe steps needed to walk from `from` to `to`.
#[inline]
fn probe_distance(from: usize, to: usize, mask: usize) -> usize {
    to.wrapping_sub(from) & mask
}

pub(crate) struct RawTable<K, V> {
    slots: SlotArray<K, V>,
    len: usize,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "initial capacity must be a power of two, got {capacity}"
        );

        Self {
            slots: SlotArray::allocate_zeroed(capacity),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.capacity() - 1
    }

    /// Returns the slot index holding `key`, stopping at the first vacant slot.
    pub(crate) fn find<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        debug_assert_ne!(hash, EMPTY);

        let slots = self.slots.as_slice();
        let mask = self.mask();
        let mut idx = hash as usize & mask;

        loop {
            let slot = &slots[idx];

            if slot.hash == EMPTY {
                return None;
            }

            if slot.hash == hash {
                // SAFETY: the slot is occupied, so its key is initialised.
                let stored: &Q = unsafe { slot.key.assume_init_ref() }.borrow();
                if stored == key {
                    return Some(idx);
                }
            }

            idx = (idx + 1) & mask;
        }
    }

    /// First vacant slot on the probe path of `hash`.
    ///
    /// The load factor guarantees at least one vacant slot, so this terminates.
    fn find_vacant(slots: &[Slot<K, V>], hash: u64) -> usize {
        let mask = slots.len() - 1;
        let mut idx = hash as usize & mask;

        while slots[idx].hash != EMPTY {
            idx = (idx + 1) & mask;
        }

        idx
    }

    /// Grows the table if one more entry would exceed the load factor.
    pub(crate) fn reserve_one(&mut self) {
        if (self.len + 1) * LOAD_FACTOR_DEN > self.capacity() * LOAD_FACTOR_NUM {
            self.grow();
        }
    }

    /// Doubles the capacity, relocating every entry by its cached hash.
    ///
    /// The new array is only swapped in once it is complete, until then the
    /// old one is left untouched.
    #[cold]
    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let new_capacity = match old_capacity.checked_mul(2) {
            Some(capacity) => capacity,
            None => panic!("capacity overflow"),
        };

        let mut new_slots = SlotArray::<K, V>::allocate_zeroed(new_capacity);
        let dst = new_slots.as_mut_slice();

        for slot in self.slots.as_slice().iter().filter(|s| s.hash != EMPTY) {
            let idx = Self::find_vacant(dst, slot.hash);
            let vacant: *mut Slot<K, V> = &mut dst[idx];

            // SAFETY: a bitwise move into a vacant slot. The old array is
            // released below without running any destructors.
            unsafe { ptr::copy_nonoverlapping(slot as *const Slot<K, V>, vacant, 1) }
        }

        drop(mem::replace(&mut self.slots, new_slots));

        tracing::debug!(
            old_capacity,
            new_capacity,
            len = self.len,
            "grew lockmap table"
        );
    }

    /// Writes a new entry without looking for an existing one.
    ///
    /// Returns the index the entry ended up at.
    pub(crate) fn insert_new(&mut self, hash: u64, key: K, value: V) -> usize {
        debug_assert_ne!(hash, EMPTY);
        self.reserve_one();

        let slots = self.slots.as_mut_slice();
        let idx = Self::find_vacant(slots, hash);
        let slot = &mut slots[idx];
        slot.hash = hash;
        slot.key.write(key);
        slot.value.write(value);

        self.len += 1;
        idx
    }

    /// Upsert. The stored key is kept when the key is already present.
    pub(crate) fn insert(&mut self, hash: u64, key: K, value: V) -> Option<V>
    where
        K: Eq,
    {
        match self.find(hash, &key) {
            Some(idx) => Some(mem::replace(self.value_mut(idx), value)),
            None => {
                self.insert_new(hash, key, value);
                None
            }
        }
    }

    /// Removes the entry at `idx` and closes the hole it leaves.
    ///
    /// Walks the rest of the cluster and moves back every entry whose probe
    /// path crosses the hole, the hole then continues from the moved entry's
    /// old slot. Entries whose home lies past the hole stay put.
    pub(crate) fn remove_at(&mut self, idx: usize) -> (K, V) {
        let mask = self.mask();
        let slots = self.slots.as_mut_slice();
        let slot = &mut slots[idx];
        assert_ne!(slot.hash, EMPTY, "removing a vacant slot");

        // SAFETY: the slot is occupied. Its contents are overwritten or the
        // slot is marked vacant below, so they are never read again.
        let entry = unsafe { (slot.key.assume_init_read(), slot.value.assume_init_read()) };

        let base = slots.as_mut_ptr();
        let mut gap = idx;
        let mut next = (idx + 1) & mask;

        loop {
            let hash = slots[next].hash;
            if hash == EMPTY {
                break;
            }

            let home = hash as usize & mask;
            if probe_distance(home, gap, mask) < probe_distance(home, next, mask) {
                // SAFETY: both indices are in bounds and distinct, the source
                // slot becomes the new hole.
                unsafe { ptr::copy_nonoverlapping(base.add(next), base.add(gap), 1) }
                gap = next;
            }

            next = (next + 1) & mask;
        }

        slots[gap].hash = EMPTY;
        self.len -= 1;
        entry
    }

    fn occupied(&self, idx: usize) -> &Slot<K, V> {
        let slot = &self.slots.as_slice()[idx];
        assert_ne!(slot.hash, EMPTY, "slot {idx} is vacant");
        slot
    }

    fn occupied_mut(&mut self, idx: usize) -> &mut Slot<K, V> {
        let slot = &mut self.slots.as_mut_slice()[idx];
        assert_ne!(slot.hash, EMPTY, "slot {idx} is vacant");
        slot
    }

    #[inline]
    pub(crate) fn key(&self, idx: usize) -> &K {
        // SAFETY: `occupied` checked the slot holds an entry.
        unsafe { self.occupied(idx).key.assume_init_ref() }
    }

    #[inline]
    pub(crate) fn value(&self, idx: usize) -> &V {
        // SAFETY: see `key`.
        unsafe { self.occupied(idx).value.assume_init_ref() }
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, idx: usize) -> &mut V {
        // SAFETY: see `key`.
        unsafe { self.occupied_mut(idx).value.assume_init_mut() }
    }

    #[inline]
    pub(crate) fn pair(&self, idx: usize) -> (&K, &V) {
        let slot = self.occupied(idx);
        // SAFETY: see `key`.
        unsafe { (slot.key.assume_init_ref(), slot.value.assume_init_ref()) }
    }

    #[inline]
    pub(crate) fn pair_mut(&mut self, idx: usize) -> (&K, &mut V) {
        let slot = self.occupied_mut(idx);
        // SAFETY: see `key`.
        unsafe { (slot.key.assume_init_ref(), slot.value.assume_init_mut()) }
    }

    /// Drops every entry, keeping the current capacity.
    pub(crate) fn clear(&mut self) {
        for slot in self.slots.as_mut_slice() {
            if slot.hash != EMPTY {
                slot.hash = EMPTY;

                // SAFETY: the slot was occupied and is now marked vacant, so
                // the entry is moved out exactly once.
                let entry = unsafe { (slot.key.assume_init_read(), slot.value.assume_init_read()) };

                // Count first, a panicking destructor must not leave `len` stale.
                self.len -= 1;
                drop(entry);
            }
        }

        debug_assert_eq!(self.len, 0);
    }
}

impl<K, V> Drop for RawTable<K, V> {
    fn drop(&mut self) {
        if mem::needs_drop::<(K, V)>() {
            self.clear();
        }
    }
}
