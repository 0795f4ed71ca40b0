//! Error types for provisioning workflows.
//!
//! Failures returned by wrapped operations are classified with [`Failure`]:
//! anything retryable is eligible for backoff, anything terminal stops the
//! retrier immediately. Rollback errors never appear here; they are reported
//! through logging and the event sink only.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of an operation failure for the retrier.
///
/// The category is explicit data rather than something inferred from the
/// error's type, so any error type can be marked terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure<E> {
    /// A transient failure. The retrier may try again.
    #[error("{0}")]
    Retryable(E),

    /// A failure that retrying cannot fix (validation, not found, ...).
    #[error("{0}")]
    Terminal(E),
}

impl<E> Failure<E> {
    /// Marks an error as retryable.
    #[must_use]
    pub fn retryable(error: E) -> Self {
        Self::Retryable(error)
    }

    /// Marks an error as terminal.
    #[must_use]
    pub fn terminal(error: E) -> Self {
        Self::Terminal(error)
    }

    /// Returns true if the failure must not be retried.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Returns a reference to the underlying error.
    #[must_use]
    pub fn inner(&self) -> &E {
        match self {
            Self::Retryable(e) | Self::Terminal(e) => e,
        }
    }

    /// Unwraps the underlying error, dropping the classification.
    pub fn into_inner(self) -> E {
        match self {
            Self::Retryable(e) | Self::Terminal(e) => e,
        }
    }

    /// Maps the underlying error, keeping the classification.
    pub fn map<F, O>(self, f: O) -> Failure<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::Retryable(e) => Failure::Retryable(f(e)),
            Self::Terminal(e) => Failure::Terminal(f(e)),
        }
    }
}

/// Extension methods for classifying the error side of a `Result`.
pub trait FailureExt<T, E> {
    /// Classifies any error as retryable.
    fn retryable(self) -> Result<T, Failure<E>>;

    /// Classifies any error as terminal.
    fn terminal(self) -> Result<T, Failure<E>>;
}

impl<T, E> FailureExt<T, E> for Result<T, E> {
    fn retryable(self) -> Result<T, Failure<E>> {
        self.map_err(Failure::Retryable)
    }

    fn terminal(self) -> Result<T, Failure<E>> {
        self.map_err(Failure::Terminal)
    }
}

/// Error returned by a workflow whose step failed.
///
/// Always carries the error of the step that triggered the rollback, never
/// an error from the rollback itself.
#[derive(Debug, Error)]
pub enum WorkflowError<E: fmt::Debug + fmt::Display> {
    /// A step failed and the workflow was rolled back.
    #[error("workflow step '{step}' failed: {error}")]
    StepFailed {
        /// Name of the step that failed.
        step: String,
        /// The error returned by the step.
        error: E,
    },
}

impl<E: fmt::Debug + fmt::Display> WorkflowError<E> {
    /// Returns the name of the failed step.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::StepFailed { step, .. } => step,
        }
    }

    /// Returns a reference to the triggering error.
    #[must_use]
    pub fn error(&self) -> &E {
        match self {
            Self::StepFailed { error, .. } => error,
        }
    }

    /// Unwraps the triggering error.
    pub fn into_inner(self) -> E {
        match self {
            Self::StepFailed { error, .. } => error,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("unable to read config file {}: {source}", path.display())]
    Read {
        /// The path that was read.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The configuration was not valid JSON for the expected shape.
    #[error("unable to decode JSON configuration: {0}")]
    Decode(#[from] serde_json::Error),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates a validation error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        let retryable: Failure<&str> = Failure::retryable("throttled");
        let terminal: Failure<&str> = Failure::terminal("not found");

        assert!(!retryable.is_terminal());
        assert!(terminal.is_terminal());
        assert_eq!(*terminal.inner(), "not found");
        assert_eq!(retryable.into_inner(), "throttled");
    }

    #[test]
    fn test_failure_display_is_the_inner_error() {
        let failure = Failure::terminal("role does not exist".to_string());
        assert_eq!(failure.to_string(), "role does not exist");
    }

    #[test]
    fn test_failure_map_keeps_category() {
        let mapped = Failure::terminal(404).map(|code| format!("status {code}"));
        assert_eq!(mapped, Failure::Terminal("status 404".to_string()));
    }

    #[test]
    fn test_failure_ext() {
        let result: Result<(), &str> = Err("boom");
        assert_eq!(result.terminal(), Err(Failure::Terminal("boom")));

        let result: Result<u8, &str> = Ok(7);
        assert_eq!(result.retryable(), Ok(7));
    }

    #[test]
    fn test_workflow_error_keeps_step_error() {
        let err = WorkflowError::StepFailed {
            step: "create-role".to_string(),
            error: "access denied".to_string(),
        };

        assert_eq!(err.step(), "create-role");
        assert_eq!(err.to_string(), "workflow step 'create-role' failed: access denied");
        assert_eq!(err.into_inner(), "access denied");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("'org' cannot be empty");
        assert_eq!(err.to_string(), "invalid configuration: 'org' cannot be empty");
    }
}
