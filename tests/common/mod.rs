#![allow(dead_code)]

use async_trait::async_trait;
use dataset_stream::dataset::{Record, Scalar};
use dataset_stream::kafka::{PendingDelivery, SubmitError, Transport};
use dataset_stream::tracker::{FailureCause, SinkError};
use dataset_stream::{DeliveryOutcome, EventSink, Result};
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the mock does with one submission attempt.
pub enum Behavior {
    Deliver,
    DeliverAfter(Duration),
    Fail(&'static str),
    Hang,
    QueueFull,
    Fatal(&'static str),
}

type Policy = Box<dyn Fn(usize) -> Behavior + Send + Sync>;

/// In-memory transport. The policy receives the zero-based attempt number,
/// counting every call to `submit` including resubmissions.
pub struct MockTransport {
    policy: Policy,
    attempts: AtomicUsize,
    pub payloads: Mutex<Vec<Vec<u8>>>,
    pub flushes: AtomicUsize,
    outstanding: Arc<AtomicUsize>,
    pub peak_outstanding: AtomicUsize,
}

impl MockTransport {
    pub fn new(policy: impl Fn(usize) -> Behavior + Send + Sync + 'static) -> Self {
        Self {
            policy: Box::new(policy),
            attempts: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            outstanding: Arc::new(AtomicUsize::new(0)),
            peak_outstanding: AtomicUsize::new(0),
        }
    }

    pub fn always_succeeds() -> Self {
        Self::new(|_| Behavior::Deliver)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Deliveries handed out and not yet resolved. Futures dropped at a drain
    /// deadline stay counted.
    pub fn in_flight_now(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    fn track<F>(&self, outcome: F) -> PendingDelivery
    where
        F: std::future::Future<Output = DeliveryOutcome> + Send + 'static,
    {
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_outstanding.fetch_max(now, Ordering::SeqCst);

        let outstanding = self.outstanding.clone();
        async move {
            let outcome = outcome.await;
            outstanding.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
        .boxed()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn submit(
        &self,
        destination: &str,
        payload: &[u8],
    ) -> std::result::Result<PendingDelivery, SubmitError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = (self.policy)(attempt);

        match behavior {
            Behavior::QueueFull => return Err(SubmitError::QueueFull),
            Behavior::Fatal(reason) => return Err(SubmitError::Fatal(reason.to_string())),
            _ => {}
        }

        let offset = {
            let mut payloads = self.payloads.lock().unwrap();
            payloads.push(payload.to_vec());
            payloads.len() as i64 - 1
        };
        let destination = destination.to_string();

        Ok(match behavior {
            Behavior::Deliver => self.track(async move {
                tokio::task::yield_now().await;
                DeliveryOutcome::Delivered {
                    destination,
                    partition: 0,
                    offset,
                }
            }),
            Behavior::DeliverAfter(delay) => self.track(async move {
                tokio::time::sleep(delay).await;
                DeliveryOutcome::Delivered {
                    destination,
                    partition: 0,
                    offset,
                }
            }),
            Behavior::Fail(cause) => self.track(async move {
                tokio::task::yield_now().await;
                DeliveryOutcome::failed(FailureCause::Broker(cause.to_string()))
            }),
            Behavior::Hang => self.track(futures::future::pending()),
            Behavior::QueueFull | Behavior::Fatal(_) => unreachable!(),
        })
    }

    async fn flush(&self, _timeout: Duration) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Collects the log trail in memory.
#[derive(Default)]
pub struct MemorySink {
    pub info: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl EventSink for MemorySink {
    fn info(&self, message: &str) -> std::result::Result<(), SinkError> {
        self.info.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn error(&self, message: &str) -> std::result::Result<(), SinkError> {
        self.errors.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

impl MemorySink {
    pub fn delivered_offsets(&self) -> Vec<i64> {
        self.info
            .lock()
            .unwrap()
            .iter()
            .filter_map(|line| line.rsplit_once("at offset "))
            .filter_map(|(_, offset)| offset.parse().ok())
            .collect()
    }
}

/// `count` rows of `{"id": n, "name": "row-n"}`.
pub fn rows(count: usize) -> Vec<Record> {
    let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
    (0..count)
        .map(|n| {
            Record::new(
                columns.clone(),
                vec![Scalar::Int(n as i64), Scalar::Str(format!("row-{}", n))],
            )
        })
        .collect()
}
