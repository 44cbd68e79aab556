//! Delivery outcome aggregation.
//!
//! The [`DeliveryTracker`] is the terminal sink for every publish request:
//! it counts each [`DeliveryOutcome`] exactly once and writes a log entry for
//! it to an [`EventSink`]. Outcomes may arrive from any thread and in any
//! order, so all state is atomic and every method takes `&self`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// The sink could not accept a log entry.
#[derive(Error, Debug)]
#[error("event sink unavailable: {0}")]
pub struct SinkError(pub String);

/// Receives the human-readable trail of a run.
///
/// Passed explicitly to the publisher and tracker instead of relying on a
/// process-wide logger. Errors returned here are never escalated.
pub trait EventSink: Send + Sync {
    fn info(&self, message: &str) -> Result<(), SinkError>;
    fn error(&self, message: &str) -> Result<(), SinkError>;
}

/// Forwards entries to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn info(&self, message: &str) -> Result<(), SinkError> {
        tracing::info!("{}", message);
        Ok(())
    }

    fn error(&self, message: &str) -> Result<(), SinkError> {
        tracing::error!("{}", message);
        Ok(())
    }
}

/// Why a publish request ended without being delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    #[error("record could not be serialized: {0}")]
    Serialization(String),

    #[error("producer rejected the message: {0}")]
    Rejected(String),

    #[error("{0}")]
    Broker(String),

    #[error("no delivery report before the drain deadline")]
    Timeout,

    #[error("delivery report was dropped by the producer")]
    Cancelled,
}

/// Terminal result of one publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        destination: String,
        partition: i32,
        offset: i64,
    },
    Failed {
        cause: FailureCause,
    },
}

impl DeliveryOutcome {
    pub fn failed(cause: FailureCause) -> Self {
        DeliveryOutcome::Failed { cause }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered {
                destination,
                partition,
                offset,
            } => write!(
                f,
                "Message delivered to {} [{}] at offset {}",
                destination, partition, offset
            ),
            DeliveryOutcome::Failed { cause } => write!(f, "Message delivery failed: {}", cause),
        }
    }
}

pub struct DeliveryTracker {
    delivered: AtomicU64,
    failed: AtomicU64,
    sink: Arc<dyn EventSink>,
}

impl DeliveryTracker {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            sink,
        }
    }

    /// Counts the outcome and logs it. Never fails.
    pub fn record(&self, outcome: DeliveryOutcome) {
        let message = outcome.to_string();
        match outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                let _ = self.sink.info(&message);
            }
            DeliveryOutcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let _ = self.sink.error(&message);
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Number of outcomes observed so far.
    pub fn observed(&self) -> u64 {
        self.delivered() + self.failed()
    }
}

impl fmt::Debug for DeliveryTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTracker")
            .field("delivered", &self.delivered())
            .field("failed", &self.failed())
            .finish()
    }
}
