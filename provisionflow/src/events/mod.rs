//! Event sink system for observability.
//!
//! Rollback and retry report what happened through an [`EventSink`]. Sinks
//! are fire-and-forget: emitting never blocks the sweep and never fails the
//! caller.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by this crate.
pub mod event_types {
    /// A rollback sweep has started.
    pub const ROLLBACK_STARTED: &str = "rollback.started";
    /// An undo action returned an error or panicked.
    pub const ROLLBACK_ACTION_FAILED: &str = "rollback.action_failed";
    /// An undo action was skipped because the deadline had elapsed.
    pub const ROLLBACK_ACTION_SKIPPED: &str = "rollback.action_skipped";
    /// Every undo action was attempted before the deadline.
    pub const ROLLBACK_COMPLETED: &str = "rollback.completed";
    /// The deadline elapsed before the sweep finished.
    pub const ROLLBACK_TIMED_OUT: &str = "rollback.timed_out";
    /// A failed attempt will be retried after a delay.
    pub const RETRY_SCHEDULED: &str = "retry.scheduled";
    /// A terminal failure stopped the retrier.
    pub const RETRY_TERMINAL: &str = "retry.terminal";
    /// The attempt budget ran out.
    pub const RETRY_EXHAUSTED: &str = "retry.exhausted";
    /// A workflow step succeeded and registered its undo action.
    pub const WORKFLOW_STEP_SUCCEEDED: &str = "workflow.step_succeeded";
    /// A workflow step failed and triggered a rollback.
    pub const WORKFLOW_STEP_FAILED: &str = "workflow.step_failed";
}
