use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("wheel size must be non-zero")]
    ZeroWheelSize,
    #[error("wheel size {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("tick duration must be non-zero")]
    ZeroTick,
}

/// Returned by [`RingWheel::try_add`](crate::RingWheel::try_add) when the
/// target slot stayed locked. The value is handed back to the caller.
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddError<V> {
    #[error("slot {slot} is contended")]
    Contended { slot: usize, value: V },
}

impl<V> AddError<V> {
    pub fn slot(&self) -> usize {
        match self {
            AddError::Contended { slot, .. } => *slot,
        }
    }

    pub fn into_value(self) -> V {
        match self {
            AddError::Contended { value, .. } => value,
        }
    }
}

impl<V> Debug for AddError<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddError::Contended { slot, .. } => f
                .debug_struct("Contended")
                .field("slot", slot)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    #[error("the tick loop is running and owns the cursor")]
    Running,
    #[error("failed to spawn tick thread")]
    Spawn(#[source] std::io::Error),
}
