//! Publisher registry: factory for creating publishers from config.

use mp_core::config::AppConfig;
use mp_core::{PublisherKind, error::MpError};
use tracing::info;

use crate::Publisher;
use crate::console::ConsolePublisher;

/// Create the publisher for `kind`. The publisher is not yet initialised.
pub fn create_publisher(kind: PublisherKind, config: &AppConfig) -> Result<Box<dyn Publisher>, MpError> {
    info!("[registry] publisher: {kind}");
    match kind {
        PublisherKind::Console => Ok(Box::new(ConsolePublisher::new())),
        PublisherKind::Kafka => kafka_publisher(config),
    }
}

#[cfg(feature = "kafka")]
fn kafka_publisher(config: &AppConfig) -> Result<Box<dyn Publisher>, MpError> {
    Ok(Box::new(crate::kafka::KafkaPublisher::new(config.effective_kafka())))
}

#[cfg(not(feature = "kafka"))]
fn kafka_publisher(_config: &AppConfig) -> Result<Box<dyn Publisher>, MpError> {
    Err(MpError::Config("kafka-publisher requires a build with the `kafka` feature".into()))
}
