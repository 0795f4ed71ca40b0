//! Step-by-step workflow with automatic rollback.

use crate::compensation::{CompensationStack, RollbackExecutor, RollbackOutcome, UndoAction};
use crate::errors::{Failure, WorkflowError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::retry::Retrier;
use crate::utils::{generate_workflow_id, iso_timestamp, Timestamp};
use serde_json::json;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One invocation of a multi-step provisioning workflow.
///
/// Each successful step registers its undo action. When a step fails, the
/// workflow rolls back everything registered so far, newest first, and
/// returns the step's own error. [`finish`](Self::finish) commits the
/// workflow and drops the undo actions unrun.
///
/// # Example
///
/// ```rust,ignore
/// let mut wf = Workflow::new("create-account", executor, retrier);
/// let role = wf
///     .step("create-role", || iam.create_role(&name), |role| undo_role(role))
///     .await?;
/// wf.step("attach-policy", || iam.attach(&role, &arn), |_| undo_attach(&role, &arn))
///     .await?;
/// wf.finish();
/// ```
pub struct Workflow {
    id: Uuid,
    name: String,
    created_at: Timestamp,
    stack: CompensationStack,
    executor: RollbackExecutor,
    retrier: Retrier,
    sink: Arc<dyn EventSink>,
    last_rollback: Option<RollbackOutcome>,
}

impl Workflow {
    /// Creates a workflow with a fresh id and an empty undo stack.
    #[must_use]
    pub fn new(name: impl Into<String>, executor: RollbackExecutor, retrier: Retrier) -> Self {
        Self {
            id: generate_workflow_id(),
            name: name.into(),
            created_at: chrono::Utc::now(),
            stack: CompensationStack::new(),
            executor,
            retrier,
            sink: Arc::new(NoOpEventSink),
            last_rollback: None,
        }
    }

    /// Sets the event sink, shared with the rollback executor and the retrier.
    #[must_use]
    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        Self {
            executor: self.executor.with_event_sink(sink.clone()),
            retrier: self.retrier.with_event_sink(sink.clone()),
            sink,
            ..self
        }
    }

    /// Returns the workflow id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns when the workflow was created.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the retrier used by [`step`](Self::step).
    #[must_use]
    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    /// Returns the number of undo actions waiting to be run or discarded.
    #[must_use]
    pub fn pending_undo_count(&self) -> usize {
        self.stack.len()
    }

    /// Returns the names of the pending undo actions, oldest first.
    #[must_use]
    pub fn pending_undo_names(&self) -> Vec<&str> {
        self.stack.names()
    }

    /// Returns the outcome of the most recent rollback, if one ran.
    #[must_use]
    pub fn last_rollback(&self) -> Option<RollbackOutcome> {
        self.last_rollback
    }

    /// Runs a forward action through the retrier.
    ///
    /// On success `undo` builds the compensating action from the forward
    /// output and it is registered. On failure the workflow is rolled back
    /// and the forward error is returned.
    pub async fn step<T, E, F, Fut, U>(
        &mut self,
        name: &str,
        forward: F,
        undo: U,
    ) -> Result<T, WorkflowError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
        E: Debug + Display,
        U: FnOnce(&T) -> UndoAction,
    {
        match self.retrier.run(forward).await {
            Ok(value) => {
                self.register_undo(name, undo(&value));
                Ok(value)
            }
            Err(error) => Err(self.fail(name, error).await),
        }
    }

    /// Runs a forward action exactly once.
    ///
    /// Behaves like [`step`](Self::step) without retries.
    pub async fn step_once<T, E, F, Fut, U>(
        &mut self,
        name: &str,
        forward: F,
        undo: U,
    ) -> Result<T, WorkflowError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Debug + Display,
        U: FnOnce(&T) -> UndoAction,
    {
        match forward().await {
            Ok(value) => {
                self.register_undo(name, undo(&value));
                Ok(value)
            }
            Err(error) => Err(self.fail(name, error).await),
        }
    }

    /// Registers an undo action for a forward action performed outside
    /// [`step`](Self::step).
    pub fn register_undo(&mut self, step: &str, action: UndoAction) {
        debug!(
            workflow_id = %self.id,
            step,
            undo = action.name(),
            "registered undo action"
        );
        self.sink.try_emit(
            event_types::WORKFLOW_STEP_SUCCEEDED,
            Some(json!({
                "workflow_id": self.id,
                "workflow": self.name,
                "step": step,
                "undo": action.name(),
                "timestamp": iso_timestamp(),
            })),
        );
        self.stack.push(action);
    }

    /// Rolls the workflow back and hands `error` back to the caller.
    ///
    /// Use this when a failure is detected outside a step.
    pub async fn abort<E: Display>(&mut self, error: E) -> E {
        warn!(workflow_id = %self.id, error = %error, "aborting workflow");
        self.rollback().await;
        error
    }

    /// Rolls back every registered undo action.
    ///
    /// The stack is empty afterwards.
    pub async fn rollback(&mut self) -> RollbackOutcome {
        let stack = std::mem::take(&mut self.stack);
        let outcome = self.executor.execute_for(Some(self.id), stack).await;
        self.last_rollback = Some(outcome);
        outcome
    }

    /// Commits the workflow, dropping the undo actions without running them.
    ///
    /// Returns how many actions were discarded.
    pub fn finish(self) -> usize {
        let discarded = self.stack.discard();
        info!(
            workflow_id = %self.id,
            workflow = %self.name,
            discarded,
            "workflow finished"
        );
        discarded
    }

    async fn fail<E: Debug + Display>(&mut self, step: &str, error: E) -> WorkflowError<E> {
        warn!(
            workflow_id = %self.id,
            step,
            error = %error,
            pending = self.stack.len(),
            "workflow step failed, rolling back"
        );
        self.sink.try_emit(
            event_types::WORKFLOW_STEP_FAILED,
            Some(json!({
                "workflow_id": self.id,
                "workflow": self.name,
                "step": step,
                "error": error.to_string(),
                "pending": self.stack.len(),
                "timestamp": iso_timestamp(),
            })),
        );
        self.rollback().await;
        WorkflowError::StepFailed {
            step: step.to_string(),
            error,
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("stack", &self.stack)
            .field("executor", &self.executor)
            .field("retrier", &self.retrier)
            .field("last_rollback", &self.last_rollback)
            .finish_non_exhaustive()
    }
}
