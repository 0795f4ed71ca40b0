//! Execution context handed to undo actions.

use crate::cancellation::CancellationToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Context passed to every undo action of one rollback sweep.
///
/// The token is cancelled when the rollback deadline elapses. Undo actions
/// that talk to slow services should race their work against
/// [`cancelled`](Self::cancelled) or bound it with [`remaining`](Self::remaining).
#[derive(Debug, Clone)]
pub struct RollbackContext {
    token: Arc<CancellationToken>,
    deadline: Instant,
    workflow_id: Option<Uuid>,
}

impl RollbackContext {
    /// Creates a context for a sweep that must finish by `deadline`.
    #[must_use]
    pub fn new(token: Arc<CancellationToken>, deadline: Instant, workflow_id: Option<Uuid>) -> Self {
        Self {
            token,
            deadline,
            workflow_id,
        }
    }

    /// Returns the instant at which the caller stops waiting.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns true once the deadline has elapsed and the sweep was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the sweep is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Returns the workflow being rolled back, if known.
    #[must_use]
    pub fn workflow_id(&self) -> Option<Uuid> {
        self.workflow_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let ctx = RollbackContext::new(
            Arc::new(CancellationToken::new()),
            Instant::now() + Duration::from_secs(10),
            None,
        );
        assert_eq!(ctx.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.remaining(), Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_cancellation_is_shared() {
        let token = Arc::new(CancellationToken::new());
        let id = Uuid::new_v4();
        let ctx = RollbackContext::new(token.clone(), Instant::now(), Some(id));
        let copy = ctx.clone();

        assert!(!copy.is_cancelled());
        token.cancel("deadline");
        assert!(ctx.is_cancelled());
        assert!(copy.is_cancelled());
        assert_eq!(copy.workflow_id(), Some(id));
    }
}
