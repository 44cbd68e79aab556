use crate::tracker::DeliveryOutcome;
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;

/// A submitted message whose delivery report has not been observed yet.
///
/// Resolves exactly once, from whatever context the transport reports
/// deliveries on.
pub type PendingDelivery = BoxFuture<'static, DeliveryOutcome>;

#[derive(Error, Debug)]
pub enum SubmitError {
    /// The producer's local buffer is full; the message was not enqueued and
    /// may be resubmitted once outstanding deliveries complete.
    #[error("producer queue is full")]
    QueueFull,

    /// The message was refused and resubmitting it will not help.
    #[error("{0}")]
    Rejected(String),

    /// The producer can no longer be used.
    #[error("{0}")]
    Fatal(String),
}

/// The publishing side of a broker connection.
///
/// Opened once per run and shared by every submission.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueues one message without waiting for it to be acknowledged.
    fn submit(&self, destination: &str, payload: &[u8]) -> std::result::Result<PendingDelivery, SubmitError>;

    /// Waits up to `timeout` for everything buffered to be sent.
    async fn flush(&self, timeout: Duration) -> Result<()>;

    /// Messages enqueued but not yet acknowledged.
    fn in_flight(&self) -> usize {
        0
    }
}
