//! # Provisionflow
//!
//! Compensating rollback and bounded retry for multi-step cloud
//! provisioning workflows.
//!
//! A workflow that creates a role, attaches a policy and issues an access
//! key must not leave half of that behind when a later step fails. This
//! crate provides:
//!
//! - **Compensation stacks**: undo actions registered as forward steps succeed
//! - **Deadline-bounded rollback**: undo actions replayed newest first, with
//!   failures isolated and the caller released at a deadline
//! - **Bounded retry**: exponential backoff with jitter and terminal-error
//!   short-circuiting
//! - **Workflows**: the two combined, with the original error always returned
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use provisionflow::prelude::*;
//!
//! let config = provisionflow::config::load(DEFAULT_CONFIG_PATH)?;
//! let mut wf = Workflow::new("create-user", config.rollback_executor(), config.retrier());
//!
//! let user = wf
//!     .step("create-user", || iam.create_user(&name), |user| delete_user(user))
//!     .await?;
//! wf.step("create-key", || iam.create_key(&user), |key| delete_key(key))
//!     .await?;
//! wf.finish();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod compensation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod retry;
pub mod testing;
pub mod utils;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::compensation::{
        execute_rollback, CompensationStack, DeadlinePolicy, RollbackContext, RollbackExecutor,
        RollbackOutcome, UndoAction,
    };
    pub use crate::config::{ProvisionConfig, DEFAULT_CONFIG_PATH};
    pub use crate::errors::{ConfigError, Failure, FailureExt, WorkflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LoggingConfig};
    pub use crate::retry::{retry, Retrier, RetryPolicy};
    pub use crate::utils::{generate_workflow_id, iso_timestamp, Timestamp};
    pub use crate::workflow::Workflow;
}
