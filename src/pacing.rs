//! Delay between consecutive transfers.

use std::time::Duration;

use async_trait::async_trait;

/// Waits between two submissions.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn wait(&self, _duration: Duration) {}
}
