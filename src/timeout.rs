//! Per-call deadline backed by the Tokio timer.
//!
//! The deadline is armed once, when a call is dispatched, and every stage of
//! that call (response head, buffered body) races the same instant. Expiry
//! drops the in-flight future and surfaces [`Error::Cancelled`].

use core::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};

/// Absolute deadline for one call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// Deadline `limit` from now.
    pub(crate) fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    /// Arm a deadline; a zero limit disables it.
    pub(crate) fn arm(limit: Option<Duration>) -> Option<Self> {
        limit.filter(|limit| !limit.is_zero()).map(Self::after)
    }
}

/// Run `future`, failing with [`Error::Cancelled`] once `deadline` passes.
pub(crate) async fn within<T>(
    deadline: Option<Deadline>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(deadline) = deadline else {
        return future.await;
    };
    if let Ok(result) = tokio::time::timeout_at(deadline.at, future).await {
        result
    } else {
        debug!(limit_ms = deadline.limit.as_millis(), "request timed out");
        Err(Error::Cancelled {
            after: deadline.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn slow(delay: Duration) -> Result<&'static str> {
        tokio::time::sleep(delay).await;
        Ok("done")
    }

    #[tokio::test(start_paused = true)]
    async fn completes_before_timeout() {
        let deadline = Deadline::arm(Some(Duration::from_millis(50)));
        let result = within(deadline, slow(Duration::from_millis(10))).await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn errors_after_timeout_expires() {
        let start = Instant::now();
        let deadline = Deadline::arm(Some(Duration::from_millis(1000)));
        let err = within(deadline, slow(Duration::from_millis(5000)))
            .await
            .expect_err("timeout should fire first");

        assert!(err.is_timeout());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn stages_share_one_deadline() {
        let deadline = Deadline::arm(Some(Duration::from_millis(100)));
        within(deadline, slow(Duration::from_millis(60))).await.unwrap();
        let err = within(deadline, slow(Duration::from_millis(60))).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_is_no_deadline() {
        let deadline = Deadline::arm(Some(Duration::ZERO));
        assert!(deadline.is_none());
        let result = within(deadline, slow(Duration::from_millis(5))).await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn no_deadline_waits() {
        let result = within(None, slow(Duration::from_millis(5))).await;
        assert!(result.is_ok());
    }
}
