//! Topic discovery and command dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use botgrid_metrics::Metrics;
use botgrid_queue::{GroupConsumer, MessageHandler, TopicAdmin};
use botgrid_state::{naming, OutboundCommand};
use botgrid_telegram::BotApi;

/// How often the cluster is re-listed for new egress topics.
const DISCOVERY_INTERVAL: Duration = Duration::from_secs(30);

/// A running consumer bound to one egress topic.
struct ConsumerSlot {
    handle: JoinHandle<()>,
}

/// Consumes every per-bot egress topic that exists and dispatches the
/// decoded commands to Telegram.
///
/// The consumers map is mutated only by the discovery loop; topics that
/// vanish keep an idle consumer until restart.
pub struct FanoutProcessor {
    brokers: String,
    group_id: String,
    admin: Arc<dyn TopicAdmin>,
    telegram: Arc<dyn BotApi>,
    metrics: Arc<Metrics>,
    consumers: Arc<RwLock<HashMap<String, ConsumerSlot>>>,
}

impl FanoutProcessor {
    pub fn new(
        brokers: &str,
        admin: Arc<dyn TopicAdmin>,
        telegram: Arc<dyn BotApi>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            brokers: brokers.to_string(),
            group_id: naming::EGRESS_GATEWAY_GROUP.to_string(),
            admin,
            telegram,
            metrics,
            consumers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Run discovery until shutdown, then drain every consumer task.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(group = %self.group_id, "fan-out processor started");

        if let Err(e) = self.discover_and_subscribe(&shutdown).await {
            error!(error = %e, "initial topic discovery failed");
        }

        let mut shutdown_rx = shutdown.clone();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(DISCOVERY_INTERVAL) => {
                    if let Err(e) = self.discover_and_subscribe(&shutdown).await {
                        error!(error = %e, "topic discovery failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("fan-out processor shutting down");
                    break;
                }
            }
        }

        // Consumer loops share the shutdown channel and exit on their own;
        // wait for each of them.
        let mut consumers = self.consumers.write().await;
        for (topic, slot) in consumers.drain() {
            debug!(%topic, "waiting for consumer to stop");
            if let Err(e) = slot.handle.await {
                error!(%topic, error = %e, "consumer task panicked");
            }
        }
        info!("fan-out processor stopped");
    }

    /// List topics and start a consumer for every egress topic not yet
    /// covered. Existing consumers are left untouched.
    async fn discover_and_subscribe(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> botgrid_queue::QueueResult<()> {
        let listed = self.admin.list_topics().await?;

        let mut consumers = self.consumers.write().await;
        let fresh: Vec<String> = {
            let known: Vec<&str> = consumers.keys().map(String::as_str).collect();
            new_egress_topics(&known, &listed)
        };

        for topic in fresh {
            info!(%topic, "subscribing to new egress topic");
            let consumer = match GroupConsumer::new(&self.brokers, &self.group_id, &topic) {
                Ok(consumer) => consumer,
                Err(e) => {
                    error!(%topic, error = %e, "failed to create consumer");
                    continue;
                }
            };

            let handler = command_handler(self.telegram.clone(), self.metrics.clone());
            let handle = tokio::spawn(consumer.run(handler, shutdown.clone()));
            consumers.insert(topic, ConsumerSlot { handle });
        }

        Ok(())
    }

    /// Topics with an active consumer, for observability.
    pub async fn active_topics(&self) -> Vec<String> {
        self.consumers.read().await.keys().cloned().collect()
    }
}

/// Topics from `listed` that match the egress pattern and are not in
/// `known` yet.
fn new_egress_topics(known: &[&str], listed: &[String]) -> Vec<String> {
    listed
        .iter()
        .filter(|t| naming::is_egress_topic(t))
        .filter(|t| !known.contains(&t.as_str()))
        .cloned()
        .collect()
}

/// Build the per-message handler: decode, dispatch, log. Errors never
/// propagate — the consumer commits the offset either way.
fn command_handler(telegram: Arc<dyn BotApi>, metrics: Arc<Metrics>) -> MessageHandler {
    Arc::new(move |payload| {
        let telegram = telegram.clone();
        let metrics = metrics.clone();
        Box::pin(async move {
            dispatch_command(telegram.as_ref(), &metrics, &payload).await;
        })
    })
}

async fn dispatch_command(telegram: &dyn BotApi, metrics: &Metrics, payload: &[u8]) {
    let command: OutboundCommand = match serde_json::from_slice(payload) {
        Ok(command) => command,
        Err(e) => {
            error!(error = %e, "undecodable command, skipping");
            Metrics::incr(&metrics.commands_failed);
            return;
        }
    };

    debug!(method = %command.method, "dispatching command");
    match telegram
        .call_method(&command.bot_token, &command.method, command.params.as_ref())
        .await
    {
        Ok(_) => Metrics::incr(&metrics.commands_processed),
        Err(e) => {
            // Reported, not retried: the offset still advances.
            error!(method = %command.method, error = %e, "telegram call failed");
            Metrics::incr(&metrics.commands_failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use botgrid_telegram::{TelegramError, TelegramResult};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<(String, String, Option<Value>)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl BotApi for RecordingApi {
        async fn set_webhook(
            &self,
            _bot_token: &str,
            _webhook_url: &str,
            _ca_cert: Option<Vec<u8>>,
        ) -> TelegramResult<()> {
            Ok(())
        }

        async fn delete_webhook(&self, _bot_token: &str) -> TelegramResult<()> {
            Ok(())
        }

        async fn call_method(
            &self,
            bot_token: &str,
            method: &str,
            params: Option<&Value>,
        ) -> TelegramResult<Value> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TelegramError::Api {
                    code: 400,
                    description: "chat not found".to_string(),
                });
            }
            self.calls.lock().unwrap().push((
                bot_token.to_string(),
                method.to_string(),
                params.cloned(),
            ));
            Ok(json!({"message_id": 1}))
        }
    }

    #[test]
    fn discovery_selects_only_new_egress_topics() {
        let listed = vec![
            "bot_a_outgoing".to_string(),
            "bot_b_outgoing".to_string(),
            "bot_a_incoming".to_string(),
            "__consumer_offsets".to_string(),
            "orders".to_string(),
        ];
        let fresh = new_egress_topics(&["bot_a_outgoing"], &listed);
        assert_eq!(fresh, vec!["bot_b_outgoing".to_string()]);
    }

    #[test]
    fn discovery_with_nothing_known_takes_all_egress_topics() {
        let listed = vec![
            "bot_a_outgoing".to_string(),
            "bot_a_incoming".to_string(),
        ];
        let fresh = new_egress_topics(&[], &listed);
        assert_eq!(fresh, vec!["bot_a_outgoing".to_string()]);
    }

    #[tokio::test]
    async fn dispatch_calls_telegram_with_decoded_command() {
        let api = RecordingApi::default();
        let metrics = Metrics::new();
        let payload = serde_json::to_vec(&json!({
            "bot_token": "T",
            "method": "sendMessage",
            "params": {"chat_id": 1, "text": "hi"}
        }))
        .unwrap();

        dispatch_command(&api, &metrics, &payload).await;

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "T");
        assert_eq!(calls[0].1, "sendMessage");
        assert_eq!(calls[0].2, Some(json!({"chat_id": 1, "text": "hi"})));
        assert_eq!(
            metrics.commands_processed.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn dispatch_without_params_sends_none() {
        let api = RecordingApi::default();
        let metrics = Metrics::new();
        let payload = br#"{"bot_token": "T", "method": "getMe"}"#;

        dispatch_command(&api, &metrics, payload).await;

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].1, "getMe");
        assert!(calls[0].2.is_none());
    }

    #[tokio::test]
    async fn failed_telegram_call_is_swallowed() {
        let api = RecordingApi::default();
        api.fail.store(true, Ordering::SeqCst);
        let metrics = Metrics::new();
        let payload = br#"{"bot_token": "T", "method": "sendMessage", "params": {}}"#;

        // Must not panic or propagate; the offset commit happens after.
        dispatch_command(&api, &metrics, payload).await;
        assert_eq!(metrics.commands_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn undecodable_payload_is_swallowed() {
        let api = RecordingApi::default();
        let metrics = Metrics::new();

        dispatch_command(&api, &metrics, b"not a command").await;
        assert_eq!(metrics.commands_failed.load(Ordering::Relaxed), 1);
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
