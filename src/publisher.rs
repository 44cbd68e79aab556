//! The batched, acknowledgment-aware publishing loop.
//!
//! Records are submitted batch by batch. After each batch the publisher
//! drains every outstanding delivery (bounded by a deadline) before it sleeps
//! the pacing delay and moves on, so at most one batch of requests is ever in
//! flight. Once the loop ends, normally or not, the transport is flushed.

use crate::dataset::Record;
use crate::kafka::{PendingDelivery, SubmitError, Transport};
use crate::tracker::{DeliveryOutcome, DeliveryTracker, EventSink, FailureCause};
use crate::{Config, Error, Result};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Stand-in deadline when `drain_timeout` overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A contiguous slice of the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a, T> {
    /// Zero-based batch number.
    pub index: usize,
    /// Position of the first item in the full sequence.
    pub offset: usize,
    pub items: &'a [T],
}

/// Splits `items` into consecutive batches of `batch_size`; only the last
/// one may be shorter.
pub fn batches<T>(items: &[T], batch_size: NonZeroUsize) -> impl Iterator<Item = Batch<'_, T>> {
    let size = batch_size.get();
    items
        .chunks(size)
        .enumerate()
        .map(move |(index, items)| Batch {
            index,
            offset: index * size,
            items,
        })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishSettings {
    pub batch_size: NonZeroUsize,
    /// Fixed sleep between batches.
    pub pacing: Duration,
    /// Longest a single drain may wait for delivery reports.
    pub drain_timeout: Duration,
}

impl PublishSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size(),
            pacing: config.sleep_time(),
            drain_timeout: config.drain_timeout(),
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
            pacing: Duration::from_millis(10),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The loop stopped early. `rows_processed` records were handed to the
    /// transport (or failed to serialize) before it stopped.
    Aborted { rows_processed: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub records_read: u64,
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub batches: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "It took {:.2} seconds to stream this dataset containing {} rows \
             ({} delivered, {} failed, {} batches)",
            self.elapsed.as_secs_f64(),
            self.records_read,
            self.delivered,
            self.failed,
            self.batches
        )?;
        if let RunStatus::Aborted {
            rows_processed,
            reason,
        } = &self.status
        {
            write!(f, "; aborted after {} rows: {}", rows_processed, reason)?;
        }
        Ok(())
    }
}

/// Progress of the current run, kept outside the loop so an early exit can
/// still report it.
#[derive(Debug, Default)]
struct Progress {
    submitted: u64,
    batches: u64,
}

pub struct BatchPublisher<T: Transport> {
    transport: T,
    settings: PublishSettings,
    sink: Arc<dyn EventSink>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<T: Transport> BatchPublisher<T> {
    pub fn new(transport: T, settings: PublishSettings, sink: Arc<dyn EventSink>) -> Self {
        Self {
            transport,
            settings,
            sink,
            shutdown: None,
        }
    }

    /// Stops the run at the next record or pacing boundary once the watched
    /// value becomes `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Publishes every record to `destination`.
    ///
    /// Per-record failures are counted, not returned. An error that stops the
    /// loop is reported through [`RunStatus::Aborted`]; either way everything
    /// already submitted is drained and the transport flushed before this
    /// returns.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn publish(&self, records: &[Record], destination: &str) -> RunSummary {
        let started_at = Utc::now();
        let start = Instant::now();
        let _ = self.sink.info(&format!(
            "Streaming {} rows to {} (run started {})",
            records.len(),
            destination,
            started_at.to_rfc3339()
        ));
        let tracker = DeliveryTracker::new(self.sink.clone());
        let mut in_flight = FuturesUnordered::new();
        let mut progress = Progress::default();

        let result = self
            .run_batches(records, destination, &tracker, &mut in_flight, &mut progress)
            .await;

        let status = match result {
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                let _ = self.sink.error(&format!("An error occurred: {}", e));
                if !in_flight.is_empty() {
                    self.drain(&mut in_flight, &tracker).await;
                }
                RunStatus::Aborted {
                    rows_processed: progress.submitted,
                    reason: e.to_string(),
                }
            }
        };

        if let Err(e) = self.transport.flush(self.settings.drain_timeout).await {
            let _ = self
                .sink
                .error(&format!("Final flush did not complete: {}", e));
        }

        let summary = RunSummary {
            status,
            records_read: records.len() as u64,
            submitted: progress.submitted,
            delivered: tracker.delivered(),
            failed: tracker.failed(),
            batches: progress.batches,
            started_at,
            elapsed: start.elapsed(),
        };

        if summary.is_complete() {
            let _ = self.sink.info("Data sent to Kafka cluster");
        }
        let _ = self.sink.info(&summary.to_string());
        summary
    }

    async fn run_batches(
        &self,
        records: &[Record],
        destination: &str,
        tracker: &DeliveryTracker,
        in_flight: &mut FuturesUnordered<PendingDelivery>,
        progress: &mut Progress,
    ) -> Result<()> {
        let total = records.len().div_ceil(self.settings.batch_size.get());

        for batch in batches(records, self.settings.batch_size) {
            progress.batches += 1;
            debug!(
                batch = batch.index,
                offset = batch.offset,
                size = batch.items.len(),
                "Submitting batch"
            );

            for record in batch.items {
                self.check_shutdown()?;
                progress.submitted += 1;
                self.submit_one(record, destination, tracker, in_flight)
                    .await?;
            }

            self.drain(in_flight, tracker).await;
            debug!(
                batch = batch.index,
                delivered = tracker.delivered(),
                failed = tracker.failed(),
                "Batch drained"
            );

            if batch.index + 1 < total {
                self.pace().await?;
            }
        }
        Ok(())
    }

    async fn submit_one(
        &self,
        record: &Record,
        destination: &str,
        tracker: &DeliveryTracker,
        in_flight: &mut FuturesUnordered<PendingDelivery>,
    ) -> Result<()> {
        let payload = match record.to_json_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracker.record(DeliveryOutcome::failed(FailureCause::Serialization(
                    e.to_string(),
                )));
                return Ok(());
            }
        };

        let submitted = match self.transport.submit(destination, &payload) {
            Err(SubmitError::QueueFull) => {
                debug!(
                    in_flight = in_flight.len(),
                    "Producer queue full, draining before resubmitting"
                );
                self.drain(in_flight, tracker).await;
                self.transport.submit(destination, &payload)
            }
            other => other,
        };

        match submitted {
            Ok(pending) => in_flight.push(pending),
            Err(SubmitError::Fatal(reason)) => {
                tracker.record(DeliveryOutcome::failed(FailureCause::Rejected(
                    reason.clone(),
                )));
                return Err(Error::Transport(reason));
            }
            Err(e) => tracker.record(DeliveryOutcome::failed(FailureCause::Rejected(
                e.to_string(),
            ))),
        }
        Ok(())
    }

    /// Waits for every in-flight request to resolve or for the drain deadline;
    /// whatever is still outstanding at the deadline is counted as timed out.
    async fn drain(
        &self,
        in_flight: &mut FuturesUnordered<PendingDelivery>,
        tracker: &DeliveryTracker,
    ) {
        let now = tokio::time::Instant::now();
        let deadline = now
            .checked_add(self.settings.drain_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        loop {
            match tokio::time::timeout_at(deadline, in_flight.next()).await {
                Ok(Some(outcome)) => tracker.record(outcome),
                Ok(None) => break,
                Err(_) => {
                    let stranded = in_flight.len();
                    let queued = self.transport.in_flight();
                    warn!(
                        stranded,
                        queued,
                        timeout = ?self.settings.drain_timeout,
                        "Drain deadline reached"
                    );
                    let _ = self.sink.error(&format!(
                        "Gave up on {} deliveries at the drain deadline; {} still queued in the producer",
                        stranded, queued
                    ));
                    for _ in 0..stranded {
                        tracker.record(DeliveryOutcome::failed(FailureCause::Timeout));
                    }
                    in_flight.clear();
                    break;
                }
            }
        }
    }

    async fn pace(&self) -> Result<()> {
        if self.settings.pacing.is_zero() {
            return Ok(());
        }
        match self.shutdown.clone() {
            Some(mut shutdown) => {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.pacing) => Ok(()),
                    Ok(_) = shutdown.wait_for(|stop| *stop) => Err(Error::Shutdown),
                }
            }
            None => {
                tokio::time::sleep(self.settings.pacing).await;
                Ok(())
            }
        }
    }

    fn check_shutdown(&self) -> Result<()> {
        match &self.shutdown {
            Some(shutdown) if *shutdown.borrow() => Err(Error::Shutdown),
            _ => Ok(()),
        }
    }
}
