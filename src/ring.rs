use std::{sync::Arc, thread};

use crate::{
    entry::Entry,
    lock::SlotLocks,
    slot::{Bucket, SlotStore},
};

/// Spins before falling back to `yield_now` while waiting on a slot.
const SPIN_LIMIT: u32 = 64;

/// The circular array of buckets together with its per-slot locks.
///
/// All bucket access goes through a [`SlotGuard`], which is the only way
/// to obtain one and releases the slot on drop.
pub(crate) struct Ring<K, V> {
    store: SlotStore<K, V>,
    locks: SlotLocks,
    mask: usize,
}

impl<K, V> Ring<K, V> {
    /// `wheel_size` must be a power of two.
    pub(crate) fn new(wheel_size: usize) -> Self {
        debug_assert!(wheel_size.is_power_of_two());

        Self {
            store: SlotStore::new(wheel_size),
            locks: SlotLocks::new(wheel_size),
            mask: wheel_size - 1,
        }
    }

    #[inline(always)]
    pub(crate) fn size(&self) -> usize {
        self.store.len()
    }

    #[inline(always)]
    pub(crate) fn mask(&self) -> usize {
        self.mask
    }

    /// Single compare-and-set attempt on `slot`.
    #[inline(always)]
    pub(crate) fn try_acquire(&self, slot: usize) -> Option<SlotGuard<'_, K, V>> {
        debug_assert!(slot <= self.mask, "slot {slot} out of bounds");

        if self.locks.try_acquire(slot) {
            Some(SlotGuard { ring: self, slot })
        } else {
            None
        }
    }

    /// Try up to `attempts` times, spinning then yielding between attempts.
    pub(crate) fn acquire_within(
        &self,
        slot: usize,
        attempts: u32,
    ) -> Option<SlotGuard<'_, K, V>> {
        for attempt in 0..attempts {
            if let Some(guard) = self.try_acquire(slot) {
                return Some(guard);
            }
            if attempt + 1 < attempts {
                backoff(attempt);
            }
        }
        None
    }

    /// Wait until `slot` is free. Producers hold a slot only for one push,
    /// so this never waits long.
    pub(crate) fn acquire(&self, slot: usize) -> SlotGuard<'_, K, V> {
        let mut attempt = 0u32;
        loop {
            if let Some(guard) = self.try_acquire(slot) {
                return guard;
            }
            backoff(attempt);
            attempt = attempt.saturating_add(1);
        }
    }
}

#[inline(always)]
pub(crate) fn backoff(attempt: u32) {
    if attempt < SPIN_LIMIT {
        std::hint::spin_loop();
    } else {
        thread::yield_now();
    }
}

/// Exclusive access to one slot of a [`Ring`].
pub(crate) struct SlotGuard<'a, K, V> {
    ring: &'a Ring<K, V>,
    slot: usize,
}

impl<K, V> SlotGuard<'_, K, V> {
    #[inline(always)]
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    /// Push an entry, creating the bucket if the slot was empty.
    pub(crate) fn insert(&self, entry: Arc<Entry<K, V>>) {
        // SAFETY: we hold the slot lock
        unsafe {
            match self.ring.store.bucket_at_mut(self.slot) {
                Some(bucket) => bucket.push(entry),
                None => {
                    let mut bucket = Bucket::new();
                    bucket.push(entry);
                    self.ring.store.set_bucket_at(self.slot, bucket);
                }
            }
        }
    }

    /// Age the bucket, handing due entries to `on_due`. Clears the bucket
    /// if nothing is left in it.
    pub(crate) fn sweep(&self, on_due: impl FnMut(Arc<Entry<K, V>>)) -> usize {
        // SAFETY: we hold the slot lock
        unsafe {
            let Some(bucket) = self.ring.store.bucket_at_mut(self.slot) else {
                return 0;
            };

            let due = bucket.sweep(on_due);
            if bucket.is_empty() {
                self.ring.store.clear_bucket_at(self.slot);
            }
            due
        }
    }

    /// `true` if the slot holds no bucket.
    #[cfg(test)]
    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        // SAFETY: we hold the slot lock
        unsafe { self.ring.store.bucket_at(self.slot).is_none() }
    }

    #[cfg(test)]
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        // SAFETY: we hold the slot lock
        unsafe { self.ring.store.bucket_at(self.slot).map_or(0, Bucket::len) }
    }
}

impl<K, V> Drop for SlotGuard<'_, K, V> {
    fn drop(&mut self) {
        debug_assert!(self.ring.locks.is_held(self.slot));
        self.ring.locks.release(self.slot);
    }
}
