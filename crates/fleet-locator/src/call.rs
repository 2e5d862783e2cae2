//! Deadlines and cancellation for index calls.
//!
//! Every call into an index is a remote round trip and the only place the
//! core waits. A [`CallContext`] carries the caller's deadline and
//! cancellation token into those calls. When either fires first the call is
//! abandoned and surfaces as [`StoreError::Timeout`] or
//! [`StoreError::Cancelled`], never as success or as a caller error.

use core::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexKind, LocatorError, StoreError};

/// Caller-supplied limits for one ingest or query.
///
/// The deadline is absolute and shared by every index call made on behalf
/// of the request. Cancelling the token aborts whichever call is in flight.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// A context with no deadline and a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on any index call still running at `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Give up on any index call still running `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Tie the request to an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The absolute deadline, if any.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The token that cancels this request.
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Applies a [`CallContext`] and an optional per-call timeout to index calls.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CallGuard {
    per_call_timeout: Option<Duration>,
}

impl CallGuard {
    pub(crate) const fn new(per_call_timeout: Option<Duration>) -> Self {
        Self { per_call_timeout }
    }

    /// Run `call`, racing it against cancellation and the earlier of the
    /// request deadline and the per-call timeout.
    pub(crate) async fn run<T, F>(
        self,
        ctx: &CallContext,
        index: IndexKind,
        operation: &'static str,
        call: F,
    ) -> Result<T, LocatorError>
    where
        F: Future<Output = Result<T, LocatorError>>,
    {
        if ctx.cancellation.is_cancelled() {
            return Err(StoreError::Cancelled { index, operation }.into());
        }

        let started = Instant::now();
        let per_call = self.per_call_timeout.and_then(|t| started.checked_add(t));
        let deadline = match (ctx.deadline, per_call) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => core::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = ctx.cancellation.cancelled() => {
                tracing::debug!(%index, operation, "index call cancelled");
                Err(StoreError::Cancelled { index, operation }.into())
            }
            () = expiry => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(%index, operation, elapsed_ms, "index call timed out");
                Err(StoreError::Timeout { index, operation, elapsed_ms }.into())
            }
            result = call => result,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn never() -> Result<u8, LocatorError> {
        core::future::pending().await
    }

    async fn instant() -> Result<u8, LocatorError> {
        Ok(7)
    }

    #[tokio::test]
    async fn passes_result_through() {
        let out = CallGuard::default()
            .run(&CallContext::new(), IndexKind::Spatial, "search", instant())
            .await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_timeout_fires() {
        let out = CallGuard::new(Some(Duration::from_millis(50)))
            .run(&CallContext::new(), IndexKind::Freshness, "bulk_get", never())
            .await;
        assert!(matches!(
            out,
            Err(LocatorError::Store(StoreError::Timeout {
                index: IndexKind::Freshness,
                operation: "bulk_get",
                ..
            }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn request_deadline_wins_when_earlier() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(10));
        let started = Instant::now();
        let out = CallGuard::new(Some(Duration::from_secs(60)))
            .run(&ctx, IndexKind::Spatial, "upsert", never())
            .await;
        assert!(matches!(out, Err(LocatorError::Store(StoreError::Timeout { .. }))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn context_accessors() {
        let ctx = CallContext::new();
        assert_eq!(ctx.deadline(), None);
        assert!(!ctx.cancellation().is_cancelled());

        let at = Instant::now().checked_add(Duration::from_secs(3)).unwrap();
        let token = CancellationToken::new();
        let ctx = CallContext::new()
            .with_deadline(at)
            .with_cancellation(token.clone());
        assert_eq!(ctx.deadline(), Some(at));
        token.cancel();
        assert!(ctx.cancellation().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn absolute_deadline_fires() {
        let started = Instant::now();
        let at = started.checked_add(Duration::from_millis(20)).unwrap();
        let ctx = CallContext::new().with_deadline(at);
        let out = CallGuard::default()
            .run(&ctx, IndexKind::Spatial, "search", never())
            .await;
        assert!(matches!(out, Err(LocatorError::Store(StoreError::Timeout { .. }))));
        assert!(Instant::now() >= at);
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_times_out_immediately() {
        let ctx = CallContext::new().with_deadline(Instant::now());
        let out = CallGuard::default()
            .run(&ctx, IndexKind::Freshness, "bulk_get", never())
            .await;
        assert!(matches!(
            out,
            Err(LocatorError::Store(StoreError::Timeout {
                index: IndexKind::Freshness,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::new().with_cancellation(token);
        let out = CallGuard::default()
            .run(&ctx, IndexKind::Spatial, "upsert", instant())
            .await;
        assert_eq!(
            out,
            Err(LocatorError::Store(StoreError::Cancelled {
                index: IndexKind::Spatial,
                operation: "upsert",
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_mid_flight() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            token.cancel();
        });
        let out = CallGuard::default()
            .run(&ctx, IndexKind::Freshness, "upsert", never())
            .await;
        assert!(matches!(out, Err(LocatorError::Store(StoreError::Cancelled { .. }))));
        assert!(canceller.await.is_ok());
    }
}
