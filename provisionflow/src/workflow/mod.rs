//! Workflows that roll themselves back when a step fails.
//!
//! A [`Workflow`] ties the retrier and the rollback executor together:
//! forward actions run through the retrier, each success registers its undo
//! action, and the first unrecoverable failure replays the undo actions in
//! reverse before the error is handed back.

mod runner;

pub use runner::Workflow;
