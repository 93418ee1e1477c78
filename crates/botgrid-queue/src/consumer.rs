//! Group consumption with commit-always semantics.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::QueueResult;

/// Callback invoked for every fetched message payload. The callback
/// owns its error handling; the offset is committed either way.
pub type MessageHandler = Arc<dyn Fn(Vec<u8>) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// A consumer bound to one topic under a shared group id.
pub struct GroupConsumer {
    inner: StreamConsumer,
    topic: String,
}

impl GroupConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> QueueResult<Self> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .create()?;
        inner.subscribe(&[topic])?;
        Ok(Self {
            inner,
            topic: topic.to_string(),
        })
    }

    /// Fetch/handle/commit until shutdown. The offset advances on
    /// handler failure too; a poison message must not block the
    /// partition.
    pub async fn run(self, handler: MessageHandler, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, "consumer started");
        loop {
            tokio::select! {
                fetched = self.inner.recv() => {
                    match fetched {
                        Ok(message) => {
                            debug!(
                                topic = %self.topic,
                                partition = message.partition(),
                                offset = message.offset(),
                                "message received"
                            );
                            let payload = message.payload().unwrap_or_default().to_vec();
                            handler(payload).await;
                            if let Err(e) = self.inner.commit_message(&message, CommitMode::Async) {
                                error!(topic = %self.topic, error = %e, "offset commit failed");
                            }
                        }
                        Err(e) => {
                            error!(topic = %self.topic, error = %e, "fetch failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(topic = %self.topic, "consumer shutting down");
                    break;
                }
            }
        }
    }
}
