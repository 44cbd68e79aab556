use crate::config::Config;
use crate::kafka::transport::{PendingDelivery, SubmitError, Transport};
use crate::tracker::{DeliveryOutcome, FailureCause};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// librdkafka-backed transport. Delivery reports are produced on the
/// client's own polling thread.
pub struct KafkaTransport {
    producer: FutureProducer,
}

impl KafkaTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let producer: FutureProducer = client_config(config)
            .create()
            .map_err(Error::Kafka)?;

        debug!(
            brokers = %config.kafka_endpoint.bootstrap_servers(),
            "Kafka producer created"
        );
        Ok(Self { producer })
    }

    fn classify(&self, err: KafkaError) -> SubmitError {
        if let Some((code, reason)) = self.producer.client().fatal_error() {
            return SubmitError::Fatal(format!("{:?}: {}", code, reason));
        }
        match err.rdkafka_error_code() {
            Some(RDKafkaErrorCode::QueueFull) => SubmitError::QueueFull,
            Some(RDKafkaErrorCode::Fatal) => SubmitError::Fatal(err.to_string()),
            _ => SubmitError::Rejected(err.to_string()),
        }
    }
}

/// SASL PLAIN over TLS, followed by any user-supplied overrides.
pub fn client_config(config: &Config) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.kafka_endpoint.bootstrap_servers())
        .set("security.protocol", "SASL_SSL")
        .set("sasl.mechanism", "PLAIN")
        .set("sasl.username", &config.kafka_user)
        .set("sasl.password", &config.kafka_pass);

    for (key, value) in &config.producer {
        client_config.set(key, value);
    }
    client_config
}

#[async_trait]
impl Transport for KafkaTransport {
    fn submit(
        &self,
        destination: &str,
        payload: &[u8],
    ) -> std::result::Result<PendingDelivery, SubmitError> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(destination).payload(payload);

        match self.producer.send_result(record) {
            Ok(delivery) => {
                let destination = destination.to_string();
                Ok(delivery
                    .map(move |report| match report {
                        Ok(Ok((partition, offset))) => DeliveryOutcome::Delivered {
                            destination,
                            partition,
                            offset,
                        },
                        Ok(Err((err, _message))) => {
                            DeliveryOutcome::failed(FailureCause::Broker(err.to_string()))
                        }
                        Err(_canceled) => DeliveryOutcome::failed(FailureCause::Cancelled),
                    })
                    .boxed())
            }
            Err((err, _record)) => Err(self.classify(err)),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        let result = tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| Error::Transport(format!("flush task failed: {}", e)))?;

        if let Err(e) = result {
            warn!(
                in_flight = self.producer.in_flight_count(),
                "Producer flush did not complete: {}", e
            );
            return Err(Error::Kafka(e));
        }
        Ok(())
    }

    fn in_flight(&self) -> usize {
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }
}
