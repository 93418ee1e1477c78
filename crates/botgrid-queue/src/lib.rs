//! botgrid-queue — adapters for the shared Kafka cluster.
//!
//! `TopicAdmin` covers topic topology and consumer-group lag,
//! `Publisher`/`KafkaProducer` the ingress hot path, and
//! `GroupConsumer` the fetch/handle/commit loop used by the egress
//! gateway.

pub mod admin;
pub mod consumer;
pub mod producer;

use thiserror::Error;

pub use admin::{KafkaAdmin, TopicAdmin};
pub use consumer::{GroupConsumer, MessageHandler};
pub use producer::{KafkaProducer, Publisher};

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur against the queue cluster.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("kafka client error: {0}")]
    Client(#[from] rdkafka::error::KafkaError),

    #[error("topic admin error on {topic}: {message}")]
    Admin { topic: String, message: String },

    #[error("publish to {topic} failed: {message}")]
    Publish { topic: String, message: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
