//! Bounded retry with exponential backoff and jitter.
//!
//! A failed attempt is retried after `delay + jitter`, where jitter is drawn
//! uniformly from `[0, delay / 2]` and the delay doubles after every retry.
//! Failures marked [`Failure::Terminal`](crate::errors::Failure) stop the
//! loop immediately.

mod jitter;
mod policy;
mod retrier;

pub use jitter::{JitterSource, NoJitter, SeededJitter, ThreadRngJitter};
pub use policy::{RetryPolicy, BACKOFF_FACTOR};
pub use retrier::{retry, retry_blocking, Retrier};
