//! Error types and result handling for dataset-stream.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Only startup failures and run-level failures travel through [`Error`].
//! Per-record failures (a row that cannot be encoded, a message the broker
//! rejects) are recorded by the [`DeliveryTracker`](crate::tracker::DeliveryTracker)
//! and never surface here.
//!
//! # Example
//!
//! ```rust
//! use dataset_stream::{Error, Result};
//!
//! fn check_batch_size(batch_size: usize) -> Result<()> {
//!     if batch_size == 0 {
//!         return Err(Error::InvalidConfig("batch_size must be positive".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! match check_batch_size(0) {
//!     Ok(()) => println!("valid"),
//!     Err(Error::InvalidConfig(msg)) => eprintln!("invalid configuration: {}", msg),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for dataset-stream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The configuration was readable but one of its values is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The dataset path does not end in a supported extension.
    #[error("Unsupported file format for {path}: only .csv and .parquet files are supported")]
    UnsupportedFormat {
        /// The offending dataset path
        path: String,
    },

    /// CSV reader error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet reader error.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The dataset was readable but its contents are malformed.
    #[error("Malformed dataset: {message}")]
    Dataset {
        /// Description of what was malformed
        message: String,
    },

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when encoding messages.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from opening the dataset.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport reported an error it cannot recover from; the run stops.
    #[error("Fatal transport error: {0}")]
    Transport(String),

    /// Graceful shutdown was requested (e.g., via Ctrl+C).
    ///
    /// This is not really an error but uses the error mechanism
    /// to cleanly leave the publishing loop.
    #[error("Shutdown requested")]
    Shutdown,
}

/// A convenient Result type alias for dataset-stream operations.
///
/// This is equivalent to `std::result::Result<T, dataset_stream::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
