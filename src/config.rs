use crate::dataset::DatasetFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables with this prefix override file values,
/// e.g. `DATASET_STREAM_KAFKA_PASS`.
const ENV_PREFIX: &str = "DATASET_STREAM";

/// Upper bound for `sleep_time` and `drain_timeout`.
const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
    pub local_dataset_path: PathBuf,
    pub topic: String,
    pub kafka_endpoint: Endpoints,
    pub kafka_user: String,
    pub kafka_pass: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pacing delay between batches, in seconds.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: f64,
    /// Upper bound on one batch drain, in seconds.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: f64,
    /// Extra librdkafka properties, applied after the built-in defaults.
    #[serde(default)]
    pub producer: BTreeMap<String, String>,
}

/// Broker addresses, either as one (possibly comma-separated) string or a list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Endpoints {
    One(String),
    Many(Vec<String>),
}

impl Endpoints {
    /// Renders the addresses in the form `bootstrap.servers` expects.
    pub fn bootstrap_servers(&self) -> String {
        match self {
            Endpoints::One(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(","),
            Endpoints::Many(list) => list
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl Config {
    /// Loads and validates the configuration.
    ///
    /// The file format is inferred from the extension. An unsupported dataset
    /// extension is reported here, before anything is read or connected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(Error::InvalidConfig("topic must not be empty".to_string()));
        }
        if self.kafka_endpoint.bootstrap_servers().is_empty() {
            return Err(Error::InvalidConfig(
                "kafka_endpoint must name at least one broker".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch_size must be a positive integer".to_string(),
            ));
        }
        match Duration::try_from_secs_f64(self.sleep_time) {
            Ok(d) if d <= MAX_INTERVAL => {}
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "sleep_time must be between 0 and {} seconds, got {}",
                    MAX_INTERVAL.as_secs(),
                    self.sleep_time
                )))
            }
        }
        match Duration::try_from_secs_f64(self.drain_timeout) {
            Ok(d) if !d.is_zero() && d <= MAX_INTERVAL => {}
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "drain_timeout must be a positive number of seconds up to {}, got {}",
                    MAX_INTERVAL.as_secs(),
                    self.drain_timeout
                )))
            }
        }
        self.dataset_format()?;
        Ok(())
    }

    pub fn dataset_format(&self) -> Result<DatasetFormat> {
        DatasetFormat::from_path(&self.local_dataset_path)
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.batch_size).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn sleep_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.sleep_time)
            .map(|d| d.min(MAX_INTERVAL))
            .unwrap_or(Duration::ZERO)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.drain_timeout)
            .map(|d| d.min(MAX_INTERVAL))
            .unwrap_or(MAX_INTERVAL)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("local_dataset_path", &self.local_dataset_path)
            .field("topic", &self.topic)
            .field("kafka_endpoint", &self.kafka_endpoint)
            .field("kafka_user", &self.kafka_user)
            .field("kafka_pass", &"<redacted>")
            .field("batch_size", &self.batch_size)
            .field("sleep_time", &self.sleep_time)
            .field("drain_timeout", &self.drain_timeout)
            .field("producer", &self.producer.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn default_batch_size() -> usize {
    1000
}

fn default_sleep_time() -> f64 {
    0.01
}

fn default_drain_timeout() -> f64 {
    30.0
}
