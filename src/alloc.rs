//! The `alloc` module owns the raw backing storage of the table.
//!
//! Slots are handed out zero-initialised, which is exactly the empty state of
//! a slot: a cached hash of `0` marks it vacant and the key/value fields are
//! never read until a non-zero hash is written.

use core::mem::MaybeUninit;
use core::ptr::NonNull;
use core::slice;
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};

/// Cached hash of a vacant slot.
pub(crate) const EMPTY: u64 = 0;

/// One entry of the table. `key` and `value` are initialised iff `hash != EMPTY`.
pub(crate) struct Slot<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: MaybeUninit<K>,
    pub(crate) value: MaybeUninit<V>,
}

/// A fixed length, zero-initialised array of slots on the global heap.
///
/// Dropping the array releases the memory but never runs destructors of the
/// entries, the table is responsible for those.
pub(crate) struct SlotArray<K, V> {
    ptr: NonNull<Slot<K, V>>,
    len: usize,
}

// SAFETY: the array owns its entries like a `Box<[Slot<K, V>]>` would.
unsafe impl<K: Send, V: Send> Send for SlotArray<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for SlotArray<K, V> {}

impl<K, V> SlotArray<K, V> {
    pub(crate) fn allocate_zeroed(len: usize) -> Self {
        assert!(len > 0, "slot array must not be empty");

        let layout = Self::layout(len);
        // SAFETY: the layout has a non-zero size, a slot always holds a `u64`.
        let raw = unsafe { alloc_zeroed(layout) };

        match NonNull::new(raw as *mut Slot<K, V>) {
            Some(ptr) => Self { ptr, len },
            None => handle_alloc_error(layout),
        }
    }

    fn layout(len: usize) -> Layout {
        match Layout::array::<Slot<K, V>>(len) {
            Ok(layout) => layout,
            Err(_) => panic!("capacity overflow"),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[Slot<K, V>] {
        // SAFETY: `ptr` points to `len` slots, every bit pattern we ever store
        // in them is a valid `Slot` since key and value are `MaybeUninit`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Slot<K, V>] {
        // SAFETY: see `as_slice`, and `&mut self` guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<K, V> Drop for SlotArray<K, V> {
    fn drop(&mut self) {
        // SAFETY: allocated in `allocate_zeroed` with the very same layout.
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.len)) }
    }
}

#[cfg(test)]
mod tests {
    use super::{SlotArray, EMPTY};

    #[test]
    fn fresh_slots_are_empty() {
        let slots = SlotArray::<String, Vec<u8>>::allocate_zeroed(64);
        assert_eq!(slots.len(), 64);
        assert!(slots.as_slice().iter().all(|slot| slot.hash == EMPTY));
    }

    #[test]
    #[should_panic]
    fn zero_length_is_rejected() {
        let _ = SlotArray::<u32, u32>::allocate_zeroed(0);
    }
}
