//! Clock abstraction for delay nodes and auto-advance pacing.
//!
//! The loop never calls timer APIs directly; it sleeps through this trait so
//! tests run without real timers.

use std::time::Duration;

use async_trait::async_trait;

/// Suspension point provider for the auto-advance loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend the current task for `duration`.
    async fn sleep(
        &self,
        duration: Duration,
    );
}

/// Production clock backed by the tokio timer.
#[derive(Debug, Clone, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(
        &self,
        duration: Duration,
    ) {
        tokio::time::sleep(duration).await;
    }
}
