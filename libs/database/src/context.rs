//! Cancellation and deadlines for storage calls.
//!
//! A [`QueryContext`] travels with every repository call. Racing the storage
//! future against the context drops that future as soon as the caller gives
//! up, which releases the pooled connection instead of finishing the query.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a storage call was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus an optional deadline.
///
/// Cloning shares the token: cancelling any clone cancels all of them.
/// Use [`QueryContext::child`] for a context that can be cancelled on its
/// own but still follows its parent.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a context whose token is a child of this one's.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Sets the deadline to `timeout` from now, keeping an earlier one.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets the deadline, keeping an earlier one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reports why the context is already done, if it is.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else if self.deadline.is_some_and(|at| at <= Instant::now()) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Runs `operation` until it finishes or the context is done.
    ///
    /// Cancellation wins ties, so a cancelled context never starts work.
    pub async fn run<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ContextError>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ContextError::Cancelled.into()),
            () = deadline => Err(ContextError::DeadlineExceeded.into()),
            result = operation => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Context(ContextError),
        Failed,
    }

    impl From<ContextError> for TestError {
        fn from(e: ContextError) -> Self {
            TestError::Context(e)
        }
    }

    #[tokio::test]
    async fn test_run_returns_operation_result() {
        let ctx = QueryContext::new();
        let ok: Result<u32, TestError> = ctx.run(async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let failed: Result<u32, TestError> = ctx.run(async { Err(TestError::Failed) }).await;
        assert_eq!(failed, Err(TestError::Failed));
    }

    #[tokio::test]
    async fn test_cancelled_context_never_polls_operation() {
        let ctx = QueryContext::new();
        ctx.cancel();

        let polled = Arc::new(AtomicBool::new(false));
        let flag = polled.clone();
        let result: Result<(), TestError> = ctx
            .run(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Err(TestError::Context(ContextError::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_aborts_running_operation() {
        let ctx = QueryContext::new();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), TestError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(TestError::Context(ContextError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let ctx = QueryContext::new().with_timeout(Duration::from_millis(50));

        let result: Result<(), TestError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(TestError::Context(ContextError::DeadlineExceeded))
        );
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_child_follows_parent_but_not_the_reverse() {
        let parent = QueryContext::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_with_deadline_keeps_earliest() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(10);

        let ctx = QueryContext::new().with_deadline(soon).with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
    }

    #[test]
    fn test_err_is_none_for_live_context() {
        assert_eq!(QueryContext::new().err(), None);
    }
}
