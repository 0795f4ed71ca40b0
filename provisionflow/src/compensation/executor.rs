//! Deadline-bounded execution of a compensation stack.

use super::context::RollbackContext;
use super::stack::{CompensationStack, UndoAction};
use crate::cancellation::CancellationToken;
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::utils::iso_timestamp;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long a caller waits for a rollback sweep by default.
pub const DEFAULT_ROLLBACK_DEADLINE: Duration = Duration::from_secs(120);

/// Roughly 30 years; stands in for deadlines too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// What the sweep does with actions it has not started when the deadline elapses.
///
/// Under both policies the caller stops waiting, the context token is
/// cancelled, and an action that is already running is left to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlinePolicy {
    /// Keep running the remaining actions in the background.
    #[default]
    ContinueSweep,
    /// Skip every action that has not started yet.
    AbandonRemaining,
}

/// Caller-visible result of a rollback.
///
/// Individual action failures are not part of the outcome; they are logged
/// and emitted as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Every action was attempted before the deadline.
    Completed,
    /// The deadline elapsed first.
    TimedOut,
}

impl RollbackOutcome {
    /// Returns true if the sweep finished before the deadline.
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Replays compensation stacks in reverse order under a single deadline.
///
/// The sweep runs on its own task; the caller waits for either its
/// completion signal or the deadline, whichever comes first.
#[derive(Clone)]
pub struct RollbackExecutor {
    deadline: Duration,
    policy: DeadlinePolicy,
    sink: Arc<dyn EventSink>,
}

impl Default for RollbackExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_ROLLBACK_DEADLINE)
    }
}

impl RollbackExecutor {
    /// Creates an executor with the given deadline.
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            policy: DeadlinePolicy::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the deadline policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DeadlinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Returns the deadline policy.
    #[must_use]
    pub fn policy(&self) -> DeadlinePolicy {
        self.policy
    }

    /// Rolls back `stack`, newest action first.
    ///
    /// `None` or an empty stack returns [`RollbackOutcome::Completed`]
    /// immediately. Must be called from within a Tokio runtime.
    pub async fn execute(&self, stack: impl Into<Option<CompensationStack>>) -> RollbackOutcome {
        self.execute_for(None, stack).await
    }

    /// Like [`execute`](Self::execute), tagging logs and events with a workflow id.
    pub async fn execute_for(
        &self,
        workflow_id: Option<Uuid>,
        stack: impl Into<Option<CompensationStack>>,
    ) -> RollbackOutcome {
        let Some(stack) = stack.into() else {
            return RollbackOutcome::Completed;
        };
        if stack.is_empty() {
            return RollbackOutcome::Completed;
        }

        let total = stack.len();
        let now = Instant::now();
        let deadline = now
            .checked_add(self.deadline)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let token = Arc::new(CancellationToken::new());
        let ctx = RollbackContext::new(token.clone(), deadline, workflow_id);

        info!(workflow_id = ?workflow_id, tasks = total, "executing rollback of {} tasks", total);
        self.sink.try_emit(
            event_types::ROLLBACK_STARTED,
            Some(json!({
                "workflow_id": workflow_id,
                "tasks": total,
                "deadline_ms": self.deadline.as_millis() as u64,
                "timestamp": iso_timestamp(),
            })),
        );

        let sweep = Sweep {
            policy: self.policy,
            sink: self.sink.clone(),
            workflow_id,
        };
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            sweep.run(stack, ctx).await;
            let _ = done_tx.send(());
        });

        match tokio::time::timeout_at(deadline, done_rx).await {
            Ok(Ok(())) => {
                info!(workflow_id = ?workflow_id, tasks = total, "successfully rolled back");
                self.sink.try_emit(
                    event_types::ROLLBACK_COMPLETED,
                    Some(json!({
                        "workflow_id": workflow_id,
                        "tasks": total,
                        "timestamp": iso_timestamp(),
                    })),
                );
                RollbackOutcome::Completed
            }
            Ok(Err(_)) => {
                // The sweep task was dropped before signalling, e.g. during runtime shutdown.
                token.cancel("rollback sweep interrupted");
                error!(workflow_id = ?workflow_id, "rollback sweep was interrupted");
                self.report_timeout(workflow_id, total);
                RollbackOutcome::TimedOut
            }
            Err(_) => {
                token.cancel("rollback deadline elapsed");
                error!(
                    workflow_id = ?workflow_id,
                    deadline_ms = self.deadline.as_millis() as u64,
                    policy = ?self.policy,
                    "timeout waiting for successful rollback"
                );
                self.report_timeout(workflow_id, total);
                RollbackOutcome::TimedOut
            }
        }
    }

    fn report_timeout(&self, workflow_id: Option<Uuid>, total: usize) {
        self.sink.try_emit(
            event_types::ROLLBACK_TIMED_OUT,
            Some(json!({
                "workflow_id": workflow_id,
                "tasks": total,
                "deadline_ms": self.deadline.as_millis() as u64,
                "policy": self.policy,
                "timestamp": iso_timestamp(),
            })),
        );
    }
}

impl std::fmt::Debug for RollbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackExecutor")
            .field("deadline", &self.deadline)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// State moved onto the sweep task.
struct Sweep {
    policy: DeadlinePolicy,
    sink: Arc<dyn EventSink>,
    workflow_id: Option<Uuid>,
}

impl Sweep {
    async fn run(self, stack: CompensationStack, ctx: RollbackContext) {
        let total = stack.len();

        for (position, action) in stack.into_rollback_order().enumerate() {
            // Index of the action in registration order.
            let index = total - 1 - position;
            let name = action.name().to_string();

            if self.policy == DeadlinePolicy::AbandonRemaining && ctx.is_cancelled() {
                warn!(action = %name, index, "skipping rollback task, deadline elapsed");
                self.sink.try_emit(
                    event_types::ROLLBACK_ACTION_SKIPPED,
                    Some(json!({
                        "workflow_id": self.workflow_id,
                        "action": name,
                        "index": index,
                    })),
                );
                continue;
            }

            if let Err(message) = Self::run_action(action, ctx.clone()).await {
                warn!(
                    action = %name,
                    index,
                    error = %message,
                    "rollback task error, continuing rollback"
                );
                self.sink.try_emit(
                    event_types::ROLLBACK_ACTION_FAILED,
                    Some(json!({
                        "workflow_id": self.workflow_id,
                        "action": name,
                        "index": index,
                        "error": message,
                    })),
                );
            }

            debug!(action = %name, "executed rollback task {} of {}", position + 1, total);
        }
    }

    /// Runs one action, turning both errors and panics into a message.
    async fn run_action(action: UndoAction, ctx: RollbackContext) -> Result<(), String> {
        match AssertUnwindSafe(action.run(ctx)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(panic) => Err(format!("undo action panicked: {}", panic_message(&*panic))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Rolls back `stack` with a one-off executor.
///
/// Shorthand for `RollbackExecutor::new(deadline).execute(stack)`.
pub async fn execute_rollback(
    stack: impl Into<Option<CompensationStack>>,
    deadline: Duration,
) -> RollbackOutcome {
    RollbackExecutor::new(deadline).execute(stack).await
}
