use std::{cell::UnsafeCell, sync::Arc};

use crate::entry::Entry;

/// Entries sharing one slot. Unordered.
pub(crate) struct Bucket<K, V> {
    entries: Vec<Arc<Entry<K, V>>>,
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline(always)]
    pub(crate) fn push(&mut self, entry: Arc<Entry<K, V>>) {
        self.entries.push(entry);
    }

    #[cfg(test)]
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Age every entry by one revolution and move out the ones that were due.
    ///
    /// Returns the number of entries passed to `on_due`.
    pub(crate) fn sweep(&mut self, mut on_due: impl FnMut(Arc<Entry<K, V>>)) -> usize {
        let mut due = 0;
        let mut i = 0;

        while i < self.entries.len() {
            if self.entries[i].age() {
                on_due(self.entries.swap_remove(i));
                due += 1;
            } else {
                i += 1;
            }
        }

        due
    }
}

/// Fixed ring of optional buckets. An empty bucket is stored as `None`.
///
/// Has no locking of its own: every accessor is `unsafe` and requires the
/// caller to hold the slot's guard (see [`crate::ring::SlotGuard`]).
pub(crate) struct SlotStore<K, V> {
    buckets: Box<[UnsafeCell<Option<Bucket<K, V>>>]>,
}

// SAFETY: buckets are only touched through `SlotGuard`, which holds the
// per-slot lock, so no two threads ever alias the same cell mutably.
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for SlotStore<K, V> {}

impl<K, V> SlotStore<K, V> {
    pub(crate) fn new(wheel_size: usize) -> Self {
        let buckets = (0..wheel_size)
            .map(|_| UnsafeCell::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { buckets }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    /// # Safety
    /// Caller must hold the guard for `slot`.
    #[cfg(test)]
    #[inline(always)]
    pub(crate) unsafe fn bucket_at(&self, slot: usize) -> Option<&Bucket<K, V>> {
        unsafe { (*self.buckets[slot].get()).as_ref() }
    }

    /// # Safety
    /// Caller must hold the guard for `slot`.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub(crate) unsafe fn bucket_at_mut(&self, slot: usize) -> Option<&mut Bucket<K, V>> {
        unsafe { (*self.buckets[slot].get()).as_mut() }
    }

    /// # Safety
    /// Caller must hold the guard for `slot`.
    #[inline(always)]
    pub(crate) unsafe fn set_bucket_at(&self, slot: usize, bucket: Bucket<K, V>) {
        unsafe { *self.buckets[slot].get() = Some(bucket) };
    }

    /// # Safety
    /// Caller must hold the guard for `slot`.
    #[inline(always)]
    pub(crate) unsafe fn clear_bucket_at(&self, slot: usize) -> Option<Bucket<K, V>> {
        unsafe { (*self.buckets[slot].get()).take() }
    }
}
