//! Undo actions and the stack that orders them.

use super::context::RollbackContext;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;

/// The future returned by an undo action.
pub type UndoFuture = BoxFuture<'static, anyhow::Result<()>>;

type UndoFn = Box<dyn FnOnce(RollbackContext) -> UndoFuture + Send>;

/// One unit of compensating work.
///
/// Closes over whatever state it needs to reverse a forward action that
/// already succeeded (the role name to delete, the policy ARN to detach, ...).
pub struct UndoAction {
    /// Name used in logs and events.
    name: String,
    /// The compensating work.
    action: UndoFn,
}

impl UndoAction {
    /// Creates an undo action from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(RollbackContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move |ctx| action(ctx).boxed()),
        }
    }

    /// Returns the action's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the action, consuming it.
    pub fn run(self, ctx: RollbackContext) -> UndoFuture {
        (self.action)(ctx)
    }
}

impl std::fmt::Debug for UndoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Undo actions of one workflow invocation, in the order their forward
/// actions succeeded.
///
/// The stack only grows. It is consumed whole by
/// [`RollbackExecutor::execute`](super::RollbackExecutor::execute), which
/// runs the newest action first, or dropped unrun by [`discard`](Self::discard)
/// once the workflow commits.
#[derive(Default)]
pub struct CompensationStack {
    actions: Vec<UndoAction>,
}

impl CompensationStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an undo action.
    ///
    /// Call this only after the matching forward action succeeded.
    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    /// Appends an undo action built from a name and an async closure.
    pub fn push_fn<F, Fut>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce(RollbackContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(UndoAction::new(name, action));
    }

    /// Returns the number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the action names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(UndoAction::name).collect()
    }

    /// Drops every action without running it and returns how many there were.
    pub fn discard(self) -> usize {
        self.actions.len()
    }

    /// Consumes the stack, yielding actions newest first.
    pub(crate) fn into_rollback_order(self) -> impl ExactSizeIterator<Item = UndoAction> {
        self.actions.into_iter().rev()
    }
}

impl std::fmt::Debug for CompensationStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompensationStack")
            .field("actions", &self.names())
            .finish()
    }
}

impl FromIterator<UndoAction> for CompensationStack {
    fn from_iter<I: IntoIterator<Item = UndoAction>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl Extend<UndoAction> for CompensationStack {
    fn extend<I: IntoIterator<Item = UndoAction>>(&mut self, iter: I) {
        self.actions.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn ctx() -> RollbackContext {
        RollbackContext::new(
            Arc::new(CancellationToken::new()),
            Instant::now() + Duration::from_secs(1),
            None,
        )
    }

    #[test]
    fn test_push_keeps_registration_order() {
        let mut stack = CompensationStack::new();
        assert!(stack.is_empty());

        stack.push_fn("delete-role", |_ctx| async { Ok(()) });
        stack.push_fn("detach-policy", |_ctx| async { Ok(()) });

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.names(), vec!["delete-role", "detach-policy"]);
    }

    #[test]
    fn test_rollback_order_is_newest_first() {
        let stack: CompensationStack = (0..4)
            .map(|i| UndoAction::new(format!("undo-{i}"), |_ctx| async { Ok(()) }))
            .collect();

        let order: Vec<String> = stack
            .into_rollback_order()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(order, vec!["undo-3", "undo-2", "undo-1", "undo-0"]);
    }

    #[test]
    fn test_discard_reports_count() {
        let mut stack = CompensationStack::new();
        stack.extend([
            UndoAction::new("a", |_ctx| async { Ok(()) }),
            UndoAction::new("b", |_ctx| async { Ok(()) }),
        ]);
        assert_eq!(stack.discard(), 2);
    }

    #[tokio::test]
    async fn test_undo_action_runs_with_context() {
        let action = UndoAction::new("check-deadline", |ctx: RollbackContext| async move {
            anyhow::ensure!(!ctx.is_cancelled(), "context already cancelled");
            Ok(())
        });

        assert_eq!(action.name(), "check-deadline");
        assert!(action.run(ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn test_undo_action_error_is_returned() {
        let action = UndoAction::new("delete-bucket", |_ctx| async {
            Err(anyhow::anyhow!("bucket not empty"))
        });

        let err = action.run(ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "bucket not empty");
    }
}
