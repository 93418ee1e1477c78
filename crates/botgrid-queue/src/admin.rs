//! Topic administration and consumer-group lag.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use botgrid_state::naming;

use crate::{QueueError, QueueResult};

/// Partitions per bot topic.
const NUM_PARTITIONS: i32 = 3;
/// Replication factor per bot topic.
const REPLICATION_FACTOR: i32 = 2;
/// Timeout for metadata and offset queries.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Administrative view of the queue cluster.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Create the ingress and egress topics for a bot. Existing topics
    /// are tolerated.
    async fn create_bot_topics(&self, bot_id: &str) -> QueueResult<()>;

    /// Delete both topics for a bot. Unknown topics are tolerated.
    async fn delete_bot_topics(&self, bot_id: &str) -> QueueResult<()>;

    /// All topic names currently known to the cluster.
    async fn list_topics(&self) -> QueueResult<Vec<String>>;

    /// Total lag of a consumer group on a topic: sum over partitions of
    /// high watermark minus committed offset. Partitions without a
    /// committed offset count from the low watermark.
    async fn consumer_lag(&self, topic: &str, group: &str) -> QueueResult<i64>;
}

/// Kafka-backed implementation of `TopicAdmin`.
pub struct KafkaAdmin {
    admin: Arc<AdminClient<DefaultClientContext>>,
    brokers: String,
}

impl KafkaAdmin {
    pub fn new(brokers: &str) -> QueueResult<Self> {
        let admin = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()?;
        Ok(Self {
            admin: Arc::new(admin),
            brokers: brokers.to_string(),
        })
    }

    /// Collapse per-topic admin results, tolerating the given error code.
    fn collect_results(
        results: Vec<Result<String, (String, RDKafkaErrorCode)>>,
        tolerated: RDKafkaErrorCode,
    ) -> QueueResult<()> {
        for result in results {
            match result {
                Ok(topic) => debug!(%topic, "topic operation applied"),
                Err((topic, code)) if code == tolerated => {
                    debug!(%topic, ?code, "topic operation skipped")
                }
                Err((topic, code)) => {
                    return Err(QueueError::Admin {
                        topic,
                        message: code.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TopicAdmin for KafkaAdmin {
    async fn create_bot_topics(&self, bot_id: &str) -> QueueResult<()> {
        let pair = naming::topic_pair(bot_id);
        let topics = [
            NewTopic::new(
                &pair.incoming,
                NUM_PARTITIONS,
                TopicReplication::Fixed(REPLICATION_FACTOR),
            ),
            NewTopic::new(
                &pair.outgoing,
                NUM_PARTITIONS,
                TopicReplication::Fixed(REPLICATION_FACTOR),
            ),
        ];

        let results = self
            .admin
            .create_topics(topics.iter(), &AdminOptions::new())
            .await?;
        Self::collect_results(results, RDKafkaErrorCode::TopicAlreadyExists)?;

        info!(%bot_id, incoming = %pair.incoming, outgoing = %pair.outgoing, "bot topics created");
        Ok(())
    }

    async fn delete_bot_topics(&self, bot_id: &str) -> QueueResult<()> {
        let pair = naming::topic_pair(bot_id);
        let results = self
            .admin
            .delete_topics(
                &[pair.incoming.as_str(), pair.outgoing.as_str()],
                &AdminOptions::new(),
            )
            .await?;
        Self::collect_results(results, RDKafkaErrorCode::UnknownTopicOrPartition)?;

        info!(%bot_id, "bot topics deleted");
        Ok(())
    }

    async fn list_topics(&self) -> QueueResult<Vec<String>> {
        let admin = self.admin.clone();
        // librdkafka metadata calls block.
        let topics = tokio::task::spawn_blocking(move || -> QueueResult<Vec<String>> {
            let metadata = admin.inner().fetch_metadata(None, METADATA_TIMEOUT)?;
            Ok(metadata
                .topics()
                .iter()
                .map(|t| t.name().to_string())
                .collect())
        })
        .await
        .unwrap_or_else(|e| {
            Err(QueueError::Admin {
                topic: "*".to_string(),
                message: e.to_string(),
            })
        })?;
        Ok(topics)
    }

    async fn consumer_lag(&self, topic: &str, group: &str) -> QueueResult<i64> {
        let admin = self.admin.clone();
        let brokers = self.brokers.clone();
        let topic = topic.to_string();
        let group = group.to_string();

        tokio::task::spawn_blocking(move || -> QueueResult<i64> {
            let metadata = admin.inner().fetch_metadata(Some(&topic), METADATA_TIMEOUT)?;
            let partitions: Vec<i32> = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .map(|t| t.partitions().iter().map(|p| p.id()).collect())
                .unwrap_or_default();
            if partitions.is_empty() {
                return Ok(0);
            }

            // Committed offsets are a group-scoped query; a throwaway
            // consumer handle carries the group id.
            let consumer: BaseConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &group)
                .create()?;

            let mut tpl = TopicPartitionList::new();
            for p in &partitions {
                tpl.add_partition(&topic, *p);
            }
            let committed = consumer.committed_offsets(tpl, METADATA_TIMEOUT)?;

            let mut lag: i64 = 0;
            for elem in committed.elements() {
                let (low, high) = admin.inner().fetch_watermarks(
                    &topic,
                    elem.partition(),
                    METADATA_TIMEOUT,
                )?;
                let consumed = match elem.offset() {
                    Offset::Offset(o) => o,
                    // Nothing committed yet: the scaler's earliest reset
                    // policy means the group will start at the low
                    // watermark.
                    _ => low,
                };
                lag += (high - consumed).max(0);
            }
            Ok(lag)
        })
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "lag query task failed");
            Ok(0)
        })
    }
}
