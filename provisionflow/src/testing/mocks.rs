//! Mock undo actions and forward operations.

use parking_lot::Mutex;
use std::future::Ready;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::compensation::{RollbackContext, UndoAction};
use crate::errors::Failure;

/// Hands out undo actions that record their name when they run.
///
/// Clones share the same log, so the execution order of a whole rollback
/// can be read back from any of them.
#[derive(Debug, Clone, Default)]
pub struct RecordingUndo {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingUndo {
    /// Creates a recorder with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an action that records `name` and succeeds.
    pub fn action(&self, name: impl Into<String>) -> UndoAction {
        let name = name.into();
        let log = self.log.clone();
        UndoAction::new(name.clone(), move |_ctx| async move {
            log.lock().push(name);
            Ok(())
        })
    }

    /// Returns an action that records `name` and then fails with `message`.
    pub fn failing_action(&self, name: impl Into<String>, message: impl Into<String>) -> UndoAction {
        let name = name.into();
        let message = message.into();
        let log = self.log.clone();
        UndoAction::new(name.clone(), move |_ctx| async move {
            log.lock().push(name);
            Err(anyhow::anyhow!(message))
        })
    }

    /// Returns the names recorded so far, in execution order.
    #[must_use]
    pub fn recorded(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Returns the number of actions that have run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    /// Returns true if no action has run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}

/// Hands out undo actions that sleep before succeeding.
#[derive(Debug, Clone)]
pub struct SleepingUndo {
    delay: Duration,
    completed: Arc<AtomicUsize>,
    interrupted: Arc<AtomicUsize>,
}

impl SleepingUndo {
    /// Creates a helper whose actions sleep for `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            completed: Arc::new(AtomicUsize::new(0)),
            interrupted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns an action that sleeps for the full delay, ignoring cancellation.
    pub fn action(&self, name: impl Into<String>) -> UndoAction {
        let delay = self.delay;
        let completed = self.completed.clone();
        UndoAction::new(name, move |_ctx| async move {
            tokio::time::sleep(delay).await;
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    /// Returns an action that stops sleeping once the rollback is cancelled.
    pub fn cooperative_action(&self, name: impl Into<String>) -> UndoAction {
        let delay = self.delay;
        let completed = self.completed.clone();
        let interrupted = self.interrupted.clone();
        UndoAction::new(name, move |ctx: RollbackContext| async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                () = ctx.cancelled() => {
                    interrupted.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("interrupted by rollback deadline"))
                }
            }
        })
    }

    /// Returns how many actions slept for the full delay.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns how many cooperative actions were cut short.
    #[must_use]
    pub fn interrupted(&self) -> usize {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// A forward operation that fails a fixed number of times, then succeeds.
///
/// Each success returns the number of calls made so far.
#[derive(Debug)]
pub struct FlakyOperation {
    failures: usize,
    terminal: bool,
    calls: AtomicUsize,
}

impl FlakyOperation {
    /// Fails retryably `failures` times before succeeding.
    #[must_use]
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            terminal: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails retryably.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::new(usize::MAX)
    }

    /// Always fails terminally.
    #[must_use]
    pub fn terminal() -> Self {
        Self {
            terminal: true,
            ..Self::always_failing()
        }
    }

    /// Runs one attempt synchronously.
    pub fn call(&self) -> Result<usize, Failure<String>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            let message = format!("transient failure {n}");
            if self.terminal {
                return Err(Failure::terminal(message));
            }
            return Err(Failure::retryable(message));
        }
        Ok(n)
    }

    /// Runs one attempt as an already-completed future.
    pub fn attempt(&self) -> Ready<Result<usize, Failure<String>>> {
        std::future::ready(self.call())
    }

    /// Returns the number of attempts made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
