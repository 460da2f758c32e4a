use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::CachePadded;

/// Per-slot try-locks: one compare-and-set flag per slot.
///
/// `false` is free, `true` is held. Flags are cache padded so producers
/// hammering neighbouring slots do not share lines.
pub(crate) struct SlotLocks {
    flags: Box<[CachePadded<AtomicBool>]>,
}

impl SlotLocks {
    pub(crate) fn new(wheel_size: usize) -> Self {
        let flags = (0..wheel_size)
            .map(|_| CachePadded::new(AtomicBool::new(false)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { flags }
    }

    /// Transition `slot` from free to held. Fails if it is already held.
    #[inline(always)]
    pub(crate) fn try_acquire(&self, slot: usize) -> bool {
        self.flags[slot]
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Reset `slot` to free. Only the current holder may call this.
    #[inline(always)]
    pub(crate) fn release(&self, slot: usize) {
        self.flags[slot].store(false, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn is_held(&self, slot: usize) -> bool {
        self.flags[slot].load(Ordering::Relaxed)
    }
}
