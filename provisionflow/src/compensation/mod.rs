//! Compensating rollback of partially completed workflows.
//!
//! This module provides:
//! - [`UndoAction`] - one unit of compensating work
//! - [`CompensationStack`] - undo actions in the order their forward actions ran
//! - [`RollbackExecutor`] - replays a stack in reverse under a single deadline

mod context;
mod executor;
mod stack;

pub use context::RollbackContext;
pub use executor::{
    execute_rollback, DeadlinePolicy, RollbackExecutor, RollbackOutcome, DEFAULT_ROLLBACK_DEADLINE,
};
pub use stack::{CompensationStack, UndoAction, UndoFuture};
