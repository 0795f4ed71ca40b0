//! Retry policy: attempt budget and base delay.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Multiplier applied to the base delay after every retry.
pub const BACKOFF_FACTOR: u32 = 2;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    ///
    /// Zero behaves like one: the operation always runs at least once.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry. Serialized as `initial_delay_ms`.
    #[serde(
        rename = "initial_delay_ms",
        default = "default_initial_delay",
        with = "millis"
    )]
    pub initial_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

/// Whole milliseconds on the wire, full precision in memory.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        // Round up so a non-zero delay never serializes as 0.
        let ms = delay.as_nanos().div_ceil(1_000_000);
        serializer.serialize_u64(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from an attempt budget and an initial delay.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(initial_delay)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Returns the initial delay.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the number of times the operation may run.
    #[must_use]
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns the un-jittered delay before the given retry (1-based).
    ///
    /// `initial_delay * 2^(retry - 1)`, saturating on overflow.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = BACKOFF_FACTOR.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_delay()
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Returns the upper bound of the jitter added to `base`.
    #[must_use]
    pub fn max_jitter(base: Duration) -> Duration {
        base / 2
    }
}
