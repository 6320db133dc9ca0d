//! Reconnect backoff policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound of the consecutive-attempt counter.
///
/// The counter saturates here until a successful reconnect resets it, so with
/// the default policy the delay stops growing at `2 << 14` = 32 768 ms.
pub const RETRY_ATTEMPTS_MAX: u32 = 14;

/// Maps an attempt number to the delay before that attempt.
pub trait IntervalFunction: Send + Sync {
    /// Delay before attempt `attempt` (1-based, at most [`RETRY_ATTEMPTS_MAX`]).
    fn next_interval(&self, attempt: u32) -> Duration;
}

impl<F> IntervalFunction for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// How long to wait before each reconnect attempt.
#[derive(Clone, Default)]
pub enum ReconnectPolicy {
    /// `2 << attempt` milliseconds: 4, 8, 16, ... 32 768 ms.
    #[default]
    Shift,

    /// The same delay before every attempt.
    Fixed(Duration),

    /// `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential {
        /// Delay before the first attempt.
        initial: Duration,
        /// Largest delay.
        max: Duration,
    },

    /// Caller-provided function.
    Custom(Arc<dyn IntervalFunction>),
}

impl ReconnectPolicy {
    /// The default shift backoff.
    pub fn shift() -> Self {
        ReconnectPolicy::Shift
    }

    /// A constant delay.
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed(delay)
    }

    /// Doubling delay starting at `initial`, never above `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        ReconnectPolicy::Exponential { initial, max }
    }

    /// Delay computed by `f`.
    pub fn custom<F>(f: F) -> Self
    where
        F: IntervalFunction + 'static,
    {
        ReconnectPolicy::Custom(Arc::new(f))
    }

    /// Delay before attempt `attempt`. Values above [`RETRY_ATTEMPTS_MAX`]
    /// are treated as the maximum.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.min(RETRY_ATTEMPTS_MAX);
        match self {
            ReconnectPolicy::Shift => Duration::from_millis(2u64 << attempt),
            ReconnectPolicy::Fixed(delay) => *delay,
            ReconnectPolicy::Exponential { initial, max } => {
                let factor = 1u32 << attempt.saturating_sub(1);
                initial.saturating_mul(factor).min(*max)
            }
            ReconnectPolicy::Custom(f) => f.next_interval(attempt),
        }
    }
}

impl fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconnectPolicy::Shift => write!(f, "ReconnectPolicy::Shift"),
            ReconnectPolicy::Fixed(d) => write!(f, "ReconnectPolicy::Fixed({:?})", d),
            ReconnectPolicy::Exponential { initial, max } => {
                write!(f, "ReconnectPolicy::Exponential({:?}..{:?})", initial, max)
            }
            ReconnectPolicy::Custom(_) => write!(f, "ReconnectPolicy::Custom"),
        }
    }
}
