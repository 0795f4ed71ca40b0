//! Jitter sources for decorrelating concurrent retriers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// A source of random delay perturbation.
///
/// Owned by a [`Retrier`](super::Retrier) rather than shared globally, so a
/// seeded source gives reproducible delays in tests.
pub trait JitterSource: Send {
    /// Returns a duration drawn uniformly from `[0, max]`.
    fn jitter(&mut self, max: Duration) -> Duration;
}

fn nanos(max: Duration) -> u64 {
    u64::try_from(max.as_nanos()).unwrap_or(u64::MAX)
}

/// Jitter drawn from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&mut self, max: Duration) -> Duration {
        let upper = nanos(max);
        if upper == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..=upper))
    }
}

/// Deterministic jitter from a seeded RNG.
#[derive(Debug, Clone)]
pub struct SeededJitter {
    rng: StdRng,
}

impl SeededJitter {
    /// Creates a jitter source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl JitterSource for SeededJitter {
    fn jitter(&mut self, max: Duration) -> Duration {
        let upper = nanos(max);
        if upper == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.gen_range(0..=upper))
    }
}

/// A source that never adds jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn jitter(&mut self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}
