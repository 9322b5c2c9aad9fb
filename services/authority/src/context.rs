//! Per-request cancellation and deadline.
//!
//! # Purpose
//! Every service operation receives a `RequestContext`. Store and cache calls
//! are driven through `RequestContext::run`, which abandons the call as soon
//! as the caller cancels or the deadline passes.
use crate::error::{AuthError, AuthResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context cancelled together with `token` (and any of its parents).
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails fast if the request is already cancelled or past its deadline.
    pub fn check(&self) -> AuthResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(AuthError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the request is cancelled or times out
    /// first. Cancellation wins over a ready result.
    pub async fn run<F, T, E>(&self, fut: F) -> AuthResult<T>
    where
        F: Future<Output = Result<T, E>>,
        AuthError: From<E>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled),
            _ = deadline => Err(AuthError::DeadlineExceeded),
            result = fut => result.map_err(AuthError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[tokio::test]
    async fn run_passes_results_through() {
        let ctx = RequestContext::new();
        let value = ctx.run(async { Ok::<_, StoreError>(7) }).await.expect("value");
        assert_eq!(value, 7);
        let err = ctx
            .run(async { Err::<(), _>(StoreError::NotFound("x".into())) })
            .await
            .expect_err("not found");
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancellation_abandons_pending_call() {
        let ctx = RequestContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = ctx
            .run(std::future::pending::<Result<(), StoreError>>())
            .await
            .expect_err("cancelled");
        assert!(matches!(err, AuthError::Cancelled));
        assert!(matches!(ctx.check(), Err(AuthError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_pending_call() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
        assert!(ctx.check().is_ok());
        let err = ctx
            .run(std::future::pending::<Result<(), StoreError>>())
            .await
            .expect_err("deadline");
        assert!(matches!(err, AuthError::DeadlineExceeded));
        assert!(matches!(ctx.check(), Err(AuthError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn child_token_cancels_with_parent() {
        let parent = CancellationToken::new();
        let ctx = RequestContext::with_cancellation(parent.child_token());
        parent.cancel();
        let err = ctx
            .run(async { Ok::<_, StoreError>(()) })
            .await
            .expect_err("cancelled");
        assert!(matches!(err, AuthError::Cancelled));
    }
}
