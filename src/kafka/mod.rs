pub mod producer;
pub mod transport;


pub use producer::KafkaTransport;
pub use transport::{PendingDelivery, SubmitError, Transport};
