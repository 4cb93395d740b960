//! Kafka publisher built on `rdkafka`'s [`FutureProducer`].
//!
//! The producer is created in [`initialise`](Publisher::initialise) from the
//! merged producer properties (properties file, inline map, `KAFKA_*`
//! environment). Each record is awaited until its delivery report arrives.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mp_core::config::KafkaConfig;
use mp_core::error::MpError;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::{info, warn};

use crate::Publisher;

/// Publishes every record to one Kafka topic.
pub struct KafkaPublisher {
    config: KafkaConfig,
    producer: Option<FutureProducer>,
}

impl KafkaPublisher {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config, producer: None }
    }

    fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.config.delivery_timeout_ms)
    }

    /// Build the producer from resolved properties.
    ///
    /// `message.timeout.ms` defaults to the delivery timeout so a stuck
    /// broker surfaces as a delivery error rather than an endless wait.
    fn build_producer(&self, mut props: HashMap<String, String>) -> Result<FutureProducer, MpError> {
        props.entry("message.timeout.ms".into()).or_insert_with(|| self.config.delivery_timeout_ms.to_string());

        let mut client = ClientConfig::new();
        for (k, v) in &props {
            client.set(k, v);
        }
        client.create().map_err(|e| MpError::Config(format!("failed to create Kafka producer: {e}")))
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    fn name(&self) -> &str {
        "kafka-publisher"
    }

    async fn initialise(&mut self) -> Result<(), MpError> {
        let props = self.config.resolve_properties(|var| std::env::var(var).ok())?;
        let servers = props.get("bootstrap.servers").cloned().unwrap_or_default();
        self.producer = Some(self.build_producer(props)?);
        info!("[kafka-publisher] producer ready, topic {} via {servers}", self.config.topic);
        Ok(())
    }

    async fn publish(&mut self, key: &str, payload: &str) -> Result<(), MpError> {
        let Some(producer) = &self.producer else {
            return Err(MpError::Publish("kafka producer not initialised".into()));
        };

        let record = FutureRecord::to(&self.config.topic).key(key).payload(payload);
        producer
            .send(record, self.delivery_timeout())
            .await
            .map_err(|(e, _)| MpError::Publish(format!("delivery to {} failed for {key}: {e}", self.config.topic)))?;
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), MpError> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        let timeout = self.delivery_timeout();

        // flush blocks on librdkafka's poll loop
        let flushed = tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| MpError::Publish(format!("flush task failed: {e}")))?;
        if let Err(e) = flushed {
            warn!("[kafka-publisher] flush incomplete: {e}");
            return Err(MpError::Publish(format!("flush failed: {e}")));
        }
        info!("[kafka-publisher] flushed and closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KafkaConfig {
        KafkaConfig {
            properties: HashMap::from([("bootstrap.servers".to_string(), "127.0.0.1:1".to_string())]),
            delivery_timeout_ms: 200,
            ..KafkaConfig::default()
        }
    }

    #[tokio::test]
    async fn publish_before_initialise_fails() {
        let mut p = KafkaPublisher::new(config());
        assert!(matches!(p.publish("k", "v").await, Err(MpError::Publish(_))));
    }

    #[tokio::test]
    async fn initialise_requires_bootstrap_servers() {
        let mut p = KafkaPublisher::new(KafkaConfig::default());
        assert!(matches!(p.initialise().await, Err(MpError::Config(_))));
    }

    #[tokio::test]
    async fn cleanup_without_producer_is_noop() {
        let mut p = KafkaPublisher::new(config());
        p.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_broker_is_delivery_error() {
        let mut p = KafkaPublisher::new(config());
        p.initialise().await.unwrap();
        assert!(matches!(p.publish("EXR.D.AUD.EUR.SP00.A", "{}").await, Err(MpError::Publish(_))));
    }
}
