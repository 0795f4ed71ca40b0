//! Cooperative cancellation for rollback work.
//!
//! Undo actions receive a token through their [`RollbackContext`]; the
//! executor cancels it when the rollback deadline elapses.
//!
//! [`RollbackContext`]: crate::compensation::RollbackContext

mod token;

pub use token::CancellationToken;
