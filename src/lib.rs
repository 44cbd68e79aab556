pub mod config;
pub mod dataset;
pub mod error;
pub mod publisher;
pub mod tracker;

pub mod kafka;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::publisher::{BatchPublisher, PublishSettings, RunStatus, RunSummary};
pub use crate::tracker::{DeliveryOutcome, DeliveryTracker, EventSink, TracingSink};
