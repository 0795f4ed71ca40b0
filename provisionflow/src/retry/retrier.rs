//! The retry loop.

use super::jitter::{JitterSource, ThreadRngJitter};
use super::policy::RetryPolicy;
use crate::errors::Failure;
use crate::events::{event_types, EventSink, NoOpEventSink};
use parking_lot::Mutex;
use serde_json::json;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What to do after a failed attempt.
#[derive(Debug)]
enum RetryDecision<E> {
    /// Sleep, then run the operation again.
    Retry(Duration),
    /// Give up and return the error to the caller.
    Stop(E),
}

/// Re-invokes a fallible operation with exponential backoff.
///
/// Each call to [`run`](Self::run) is independent: no attempt state is kept
/// between calls. The jitter source is the only mutable state and it is
/// owned by the retrier.
///
/// # Example
///
/// ```rust,ignore
/// use provisionflow::prelude::*;
///
/// let retrier = Retrier::new(RetryPolicy::new(3, Duration::from_millis(200)));
/// let role = retrier
///     .run(|| async { iam.create_role(&name).await.map_err(classify) })
///     .await?;
/// ```
pub struct Retrier {
    /// Attempt budget and base delay.
    policy: RetryPolicy,
    /// Randomness added to each delay.
    jitter: Mutex<Box<dyn JitterSource>>,
    /// Where retry events are reported.
    sink: Arc<dyn EventSink>,
}

impl Retrier {
    /// Creates a retrier with thread-local jitter and no event sink.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            jitter: Mutex::new(Box::new(ThreadRngJitter)),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the jitter source.
    #[must_use]
    pub fn with_jitter(self, source: impl JitterSource + 'static) -> Self {
        Self {
            jitter: Mutex::new(Box::new(source)),
            ..self
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the delay to wait before the given retry (1-based), jitter included.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let base = self.policy.base_delay(retry);
        let jitter = self.jitter.lock().jitter(RetryPolicy::max_jitter(base));
        base.saturating_add(jitter)
    }

    fn decide<E: Display>(&self, attempt: u32, failure: Failure<E>) -> RetryDecision<E> {
        match failure {
            Failure::Terminal(error) => {
                debug!(attempt, error = %error, "Terminal failure, not retrying");
                self.sink.try_emit(
                    event_types::RETRY_TERMINAL,
                    Some(json!({ "attempt": attempt, "error": error.to_string() })),
                );
                RetryDecision::Stop(error)
            }
            Failure::Retryable(error) if attempt >= self.policy.effective_attempts() => {
                warn!(attempts = attempt, error = %error, "Retry attempts exhausted");
                self.sink.try_emit(
                    event_types::RETRY_EXHAUSTED,
                    Some(json!({ "attempts": attempt, "error": error.to_string() })),
                );
                RetryDecision::Stop(error)
            }
            Failure::Retryable(error) => {
                let delay = self.next_delay(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying after error"
                );
                self.sink.try_emit(
                    event_types::RETRY_SCHEDULED,
                    Some(json!({
                        "attempt": attempt,
                        "delay_ms": delay.as_millis() as u64,
                        "error": error.to_string(),
                    })),
                );
                RetryDecision::Retry(delay)
            }
        }
    }

    /// Runs `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent.
    ///
    /// The operation always runs at least once. On a terminal failure the
    /// underlying error is returned at once; on exhaustion the last error is
    /// returned verbatim. Attempts are awaited one after another inside the
    /// caller's task.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
        E: Display,
    {
        let mut attempt: u32 = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(failure) => match self.decide(attempt, failure) {
                    RetryDecision::Retry(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::Stop(error) => return Err(error),
                },
            }
        }
    }

    /// Blocking variant of [`run`](Self::run) that sleeps the calling thread.
    ///
    /// Must not be called from inside an async runtime worker.
    pub fn run_blocking<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, Failure<E>>,
        E: Display,
    {
        let mut attempt: u32 = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(failure) => match self.decide(attempt, failure) {
                    RetryDecision::Retry(delay) => {
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                    RetryDecision::Stop(error) => return Err(error),
                },
            }
        }
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Retries `operation` with a fresh [`Retrier`].
///
/// Shorthand for `Retrier::new(RetryPolicy::new(max_attempts, initial_delay)).run(operation)`.
pub async fn retry<T, E, F, Fut>(
    max_attempts: u32,
    initial_delay: Duration,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure<E>>>,
    E: Display,
{
    Retrier::new(RetryPolicy::new(max_attempts, initial_delay))
        .run(operation)
        .await
}

/// Blocking counterpart of [`retry`].
pub fn retry_blocking<T, E, F>(max_attempts: u32, initial_delay: Duration, operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, Failure<E>>,
    E: Display,
{
    Retrier::new(RetryPolicy::new(max_attempts, initial_delay)).run_blocking(operation)
}
