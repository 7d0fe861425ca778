//! Injectable waiting for retry and poll loops

use std::time::Duration;

use async_trait::async_trait;

/// Suspends the current session for a given duration.
///
/// Every wait in the orchestration layer (408 back-off, wake polling,
/// settle delay) goes through this trait so tests can substitute a
/// zero-cost implementation and assert on the requested durations.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Production delay backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
