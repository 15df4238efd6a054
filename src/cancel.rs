//! Cancellation utilities
//!
//! Provides a cancellation handle for pipeline runs.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The in-flight network future of the run observing
    /// this handle is dropped, which closes its HTTP connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Race `fut` against cancellation.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(PipelineError::Cancelled),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_returns_cancelled_for_pending_future() {
        let handle = CancelHandle::new();
        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let res: Result<(), _> = handle.guard(std::future::pending()).await;
        assert_eq!(res, Err(PipelineError::Cancelled));
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn guard_passes_through_results() {
        let handle = CancelHandle::new();
        assert_eq!(handle.guard(async { Ok(7) }).await, Ok(7));
    }
}
