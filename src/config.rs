use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_WHEEL_SIZE: usize = 64;
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_SPINS: u32 = 1024;

/// How a producer acquires the slot guard in `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPolicy {
    /// A single compare-and-set attempt. If the slot is held by another
    /// producer or the sweep, the entry is dropped.
    OneShot,
    /// Retry with backoff for up to `max_spins` attempts before dropping.
    Spin { max_spins: u32 },
}

impl Default for GuardPolicy {
    fn default() -> Self {
        GuardPolicy::Spin {
            max_spins: DEFAULT_MAX_SPINS,
        }
    }
}

impl GuardPolicy {
    #[inline(always)]
    pub(crate) fn attempts(self) -> u32 {
        match self {
            GuardPolicy::OneShot => 1,
            GuardPolicy::Spin { max_spins } => max_spins.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelConfig {
    /// Number of slots. Must be a power of two.
    pub wheel_size: usize,
    /// Wall time of one tick.
    pub tick: Duration,
    pub guard_policy: GuardPolicy,
    /// Catch consumer panics so the tick loop survives them.
    pub isolate_consumer: bool,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            wheel_size: DEFAULT_WHEEL_SIZE,
            tick: DEFAULT_TICK,
            guard_policy: GuardPolicy::default(),
            isolate_consumer: true,
        }
    }
}

impl WheelConfig {
    pub fn with_wheel_size(mut self, wheel_size: usize) -> Self {
        self.wheel_size = wheel_size;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_guard_policy(mut self, guard_policy: GuardPolicy) -> Self {
        self.guard_policy = guard_policy;
        self
    }

    pub fn with_consumer_isolation(mut self, isolate: bool) -> Self {
        self.isolate_consumer = isolate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel_size == 0 {
            return Err(ConfigError::ZeroWheelSize);
        }
        if !self.wheel_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo(self.wheel_size));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    /// `log2(wheel_size)`, the shift that turns a delay into a cycle count.
    #[inline(always)]
    pub(crate) fn cycle_shift(&self) -> u32 {
        self.wheel_size.trailing_zeros()
    }
}
