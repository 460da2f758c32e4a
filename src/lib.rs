//! A bounded ring timing wheel.
//!
//! [`RingWheel`] schedules keyed values for expiry a number of ticks in the
//! future. A fixed ring of `wheel_size` slots (a power of two) holds the
//! entries; delays longer than one revolution are tracked with a per-entry
//! cycle count. A background thread advances a cursor once per tick, sweeps
//! the slot under it and hands the expired batch to a [`Consumer`].
//!
//! ```no_run
//! use std::time::Duration;
//! use ringwheel::{Expired, RingWheel, WheelConfig};
//!
//! let config = WheelConfig::default().with_tick(Duration::from_millis(100));
//! let wheel = RingWheel::with_consumer(config, |batch: Vec<Expired<String, u32>>| {
//!     for expired in batch {
//!         println!("{} timed out", expired.key);
//!     }
//! })
//! .unwrap();
//!
//! wheel.start().unwrap();
//! wheel.add(10, "session-1".to_string(), 7);
//! assert_eq!(wheel.ttl(&"session-1".to_string()), 10);
//! ```
//!
//! # Concurrency
//!
//! Any number of threads may call [`RingWheel::add`], [`RingWheel::get_value`]
//! and [`RingWheel::ttl`] concurrently. Every bucket mutation, from producers
//! and from the sweep alike, happens under a per-slot compare-and-set lock.
//! Only the tick thread (or a caller of [`RingWheel::advance`] while no
//! thread is running) moves the cursor and removes entries, so an entry's
//! cycle count only ever decreases.

mod config;
mod driver;
mod entry;
mod error;
mod index;
mod lock;
mod ring;
mod slot;
mod wheel;

#[cfg(test)]
mod latency;

pub use config::{DEFAULT_MAX_SPINS, DEFAULT_TICK, DEFAULT_WHEEL_SIZE, GuardPolicy, WheelConfig};
pub use entry::Expired;
pub use error::{AddError, ConfigError, WheelError};
pub use wheel::{RingWheel, WheelStats};

/// Sink for expired entries, called once per tick from the tick thread.
///
/// The batch may be empty. The call is synchronous: a consumer that blocks
/// stalls every later tick.
pub trait Consumer<K, V>: Send + 'static {
    fn accept(&mut self, expired: Vec<Expired<K, V>>);
}

impl<K, V, F> Consumer<K, V> for F
where
    F: FnMut(Vec<Expired<K, V>>) + Send + 'static,
{
    #[inline(always)]
    fn accept(&mut self, expired: Vec<Expired<K, V>>) {
        self(expired)
    }
}
