//! Publishing to per-bot topics.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::debug;

use crate::{QueueError, QueueResult};

/// Seam for publishing raw payloads, so the ingress hot path can be
/// exercised without a broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a payload under a partition key and wait for the broker's
    /// acknowledgement.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> QueueResult<()>;
}

/// Kafka producer shared by all requests of a service.
pub struct KafkaProducer {
    inner: FutureProducer,
}

impl KafkaProducer {
    pub fn new(brokers: &str) -> QueueResult<Self> {
        let inner = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("compression.type", "snappy")
            .set("message.timeout.ms", "10000")
            .create()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Publisher for KafkaProducer {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> QueueResult<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        self.inner
            .send(record, Timeout::After(Duration::from_secs(10)))
            .await
            .map_err(|(e, _)| QueueError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;
        debug!(%topic, %key, "message published");
        Ok(())
    }
}
