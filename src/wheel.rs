use std::{
    hash::Hash,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering, fence},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::{
    Consumer,
    config::WheelConfig,
    driver::{Ticker, panic_message},
    entry::{Entry, Expired},
    error::{AddError, ConfigError, WheelError},
    index::KeyIndex,
    ring::{Ring, SlotGuard, backoff},
};

/// Snapshot of the wheel's monotonic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelStats {
    /// Entries placed on the wheel.
    pub scheduled: u64,
    /// Entries discarded by `add` because their slot stayed contended.
    pub dropped: u64,
    /// Entries removed by a sweep.
    pub expired: u64,
    /// Sweeps performed.
    pub ticks: u64,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    dropped: AtomicU64,
    expired: AtomicU64,
    ticks: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WheelStats {
        WheelStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the wheel handle and the tick thread.
pub(crate) struct Core<K, V> {
    pub(crate) config: WheelConfig,
    /// Held by whoever advances the cursor: the tick thread for its whole
    /// life, or `advance` for one tick.
    pub(crate) driving: Mutex<()>,
    ring: Ring<K, V>,
    index: KeyIndex<K, V>,
    cursor: AtomicUsize,
    /// Bumped before and after each sweep; odd while entries are being aged
    /// and the cursor has not moved yet.
    epoch: AtomicU64,
    consumer: Mutex<Option<Box<dyn Consumer<K, V>>>>,
    counters: Counters,
}

impl<K, V> Core<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: 'static,
{
    #[inline(always)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    #[inline(always)]
    fn slot_for(&self, cursor: usize, delay: u64) -> usize {
        ((cursor as u64).wrapping_add(delay) & self.ring.mask() as u64) as usize
    }

    #[inline(always)]
    fn cycles_for(&self, delay: u64) -> u64 {
        delay >> self.config.cycle_shift()
    }

    fn insert(&self, delay: u64, key: K, value: V) -> Result<(), AddError<V>> {
        let attempts = self.config.guard_policy.attempts();
        let cycles = self.cycles_for(delay);
        let mut cursor = self.cursor();

        let guard = loop {
            let slot = self.slot_for(cursor, delay);
            let Some(guard) = self.ring.acquire_within(slot, attempts) else {
                return Err(AddError::Contended { slot, value });
            };

            // The sweep advances the cursor before releasing its slot, so a
            // moved cursor means our slot may already have been swept.
            let current = self.cursor();
            if current == cursor {
                break guard;
            }
            cursor = current;
        };

        let entry = Arc::new(Entry::new(guard.slot(), cycles, key.clone(), value));
        guard.insert(Arc::clone(&entry));
        self.index.put(key, entry);
        drop(guard);

        self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Age the bucket under `guard`, unlinking and returning the due entries.
    fn sweep(&self, guard: &SlotGuard<'_, K, V>) -> Vec<Expired<K, V>> {
        let mut expired = Vec::new();

        guard.sweep(|entry| {
            self.index.remove(entry.key(), &entry);
            // A producer replacing the key may still hold the old handle
            let taken = match Arc::try_unwrap(entry) {
                Ok(entry) => entry.into_expired(),
                Err(shared) => shared.take_expired(),
            };
            if let Some(taken) = taken {
                expired.push(taken);
            }
        });

        self.counters
            .expired
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired
    }

    /// Sweep the slot at the cursor and advance it. Caller must hold
    /// `driving`.
    pub(crate) fn tick(&self) -> (usize, Vec<Expired<K, V>>) {
        let cursor = self.cursor();
        let guard = self.ring.acquire(cursor);

        self.epoch.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);
        let expired = self.sweep(&guard);
        self.cursor
            .store((cursor + 1) & self.ring.mask(), Ordering::Release);
        self.epoch.fetch_add(1, Ordering::Release);
        drop(guard);

        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        (cursor, expired)
    }

    /// Ticks until `key` expires, or 0 if it is not scheduled.
    ///
    /// Reads the cursor and the entry's cycle count from the same epoch, so
    /// a sweep in progress is never seen half done.
    fn ttl(&self, key: &K) -> u64 {
        let mask = self.ring.mask();
        let size = self.ring.size() as u64;

        let mut attempt = 0u32;
        loop {
            let epoch = self.epoch.load(Ordering::Acquire);
            if epoch & 1 == 0 {
                let cursor = self.cursor();
                let read = self
                    .index
                    .get(key, |entry| (entry.slot(), entry.cycles()));
                fence(Ordering::Acquire);

                if self.epoch.load(Ordering::Relaxed) == epoch {
                    return read.map_or(0, |(slot, cycles)| {
                        let distance = slot.wrapping_sub(cursor) & mask;
                        cycles * size + distance as u64
                    });
                }
            }
            backoff(attempt);
            attempt = attempt.saturating_add(1);
        }
    }

    /// Hand a batch to the consumer, if one is registered. Empty batches are
    /// delivered too.
    pub(crate) fn deliver(&self, cursor: usize, expired: Vec<Expired<K, V>>) {
        let mut consumer = self.consumer.lock();
        let Some(consumer) = consumer.as_mut() else {
            return;
        };

        if !self.config.isolate_consumer {
            consumer.accept(expired);
            return;
        }

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| consumer.accept(expired))) {
            error!(
                cursor,
                reason = panic_message(&*panic),
                "consumer panicked, batch lost"
            );
        }
    }
}

/// A bounded ring timing wheel.
///
/// Keys are scheduled `delay` ticks ahead of the cursor. A background thread
/// (see [`start`](Self::start)) advances the cursor once per tick, evicts the
/// entries whose time has come and passes them to the consumer.
///
/// Delays of a full revolution or more are handled by a per-entry cycle
/// count: the entry sits in `(cursor + delay) % wheel_size` and is aged once
/// each time the sweep passes it.
pub struct RingWheel<K, V> {
    core: Arc<Core<K, V>>,
    /// `Some` from `start` until `stop`.
    ticker: Mutex<Option<Ticker>>,
}

impl<K, V> Default for RingWheel<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RingWheel<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// 64 slots, one-second ticks, no consumer.
    pub fn new() -> Self {
        Self::build(WheelConfig::default(), None)
    }

    pub fn with_config(config: WheelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    pub fn with_consumer(
        config: WheelConfig,
        consumer: impl Consumer<K, V>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, Some(Box::new(consumer))))
    }

    fn build(config: WheelConfig, consumer: Option<Box<dyn Consumer<K, V>>>) -> Self {
        let core = Core {
            config,
            driving: Mutex::new(()),
            ring: Ring::new(config.wheel_size),
            index: KeyIndex::new(),
            cursor: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
            consumer: Mutex::new(consumer),
            counters: Counters::default(),
        };

        Self {
            core: Arc::new(core),
            ticker: Mutex::new(None),
        }
    }

    /// Spawn the tick thread. Only the first call spawns; later calls are
    /// no-ops until [`stop`](Self::stop).
    pub fn start(&self) -> Result<(), WheelError> {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return Ok(());
        }

        *ticker = Some(Ticker::spawn(Arc::clone(&self.core)).map_err(WheelError::Spawn)?);
        Ok(())
    }

    /// Stop the tick thread and wait for it to exit. Scheduled entries stay
    /// on the wheel and are not delivered. Safe to call more than once, and
    /// from inside the consumer.
    pub fn stop(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    /// Schedule `value` under `key`, `delay` ticks from now.
    ///
    /// If the slot stays contended past the configured
    /// [`GuardPolicy`](crate::GuardPolicy), the entry is dropped and counted
    /// in [`WheelStats::dropped`]. Use [`try_add`](Self::try_add) to get the
    /// value back instead.
    pub fn add(&self, delay: u64, key: K, value: V) {
        if let Err(err) = self.core.insert(delay, key, value) {
            self.core.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(slot = err.slot(), delay, "slot contended, entry dropped");
        }
    }

    /// Like [`add`](Self::add) but reports contention.
    pub fn try_add(&self, delay: u64, key: K, value: V) -> Result<(), AddError<V>> {
        self.core.insert(delay, key, value)
    }

    pub fn get_value(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.core
            .index
            .get(key, |entry| entry.with_value(V::clone))
            .flatten()
    }

    /// Ticks until `key` expires, or 0 if it is not scheduled.
    ///
    /// The slot distance is taken modulo the wheel size, so the answer stays
    /// correct after the cursor has wrapped past the entry's slot.
    pub fn ttl(&self, key: &K) -> u64 {
        self.core.ttl(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.index.contains_key(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.core.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.index.is_empty()
    }

    /// Drive one tick by hand: sweep the slot at the cursor, advance the
    /// cursor and return what expired. The consumer is not invoked.
    ///
    /// Fails while the tick thread is running.
    pub fn advance(&self) -> Result<Vec<Expired<K, V>>, WheelError> {
        if self.ticker.lock().is_some() {
            return Err(WheelError::Running);
        }
        let Some(_driving) = self.core.driving.try_lock() else {
            return Err(WheelError::Running);
        };

        let (_, expired) = self.core.tick();
        Ok(expired)
    }

    #[inline(always)]
    pub fn cursor(&self) -> usize {
        self.core.cursor()
    }

    #[inline(always)]
    pub fn wheel_size(&self) -> usize {
        self.core.config.wheel_size
    }

    #[inline(always)]
    pub fn tick_duration(&self) -> Duration {
        self.core.config.tick
    }

    pub fn stats(&self) -> WheelStats {
        self.core.counters.snapshot()
    }
}

impl<K, V> Drop for RingWheel<K, V> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.stop();
        }
    }
}
