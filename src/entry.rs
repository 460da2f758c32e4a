use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A scheduled item. Shared between its bucket and the key index.
///
/// `cycles` is atomic so `ttl` can read it without holding the slot guard;
/// it is only ever decremented, and only by the sweep. The value is taken
/// out exactly once, by the sweep, however many handles are still alive.
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    slot: usize,
    cycles: AtomicU64,
    key: K,
    value: Mutex<Option<V>>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(slot: usize, cycles: u64, key: K, value: V) -> Self {
        Self {
            slot,
            cycles: AtomicU64::new(cycles),
            key,
            value: Mutex::new(Some(value)),
        }
    }

    #[inline(always)]
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    #[inline(always)]
    pub(crate) fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    /// Run `f` on the value, or `None` once it has been handed out.
    #[inline(always)]
    pub(crate) fn with_value<R>(&self, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.value.lock().as_ref().map(f)
    }

    /// Age the entry by one revolution. Returns `true` if it was already due.
    #[inline(always)]
    pub(crate) fn age(&self) -> bool {
        let cycles = self.cycles.load(Ordering::Acquire);
        if cycles == 0 {
            return true;
        }
        self.cycles.store(cycles - 1, Ordering::Release);
        false
    }

    /// Move the payload out. `None` if it was already taken.
    pub(crate) fn into_expired(self) -> Option<Expired<K, V>> {
        let value = self.value.into_inner()?;
        Some(Expired {
            key: self.key,
            value,
        })
    }

    /// Take the payload out of an entry that other handles still point at.
    /// The key is cloned; the value moves. `None` if it was already taken.
    pub(crate) fn take_expired(&self) -> Option<Expired<K, V>>
    where
        K: Clone,
    {
        let value = self.value.lock().take()?;
        Some(Expired {
            key: self.key.clone(),
            value,
        })
    }
}

/// An entry whose time has come, as handed to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expired<K, V> {
    pub key: K,
    pub value: V,
}
