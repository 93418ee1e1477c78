//! In-memory fakes for the three external resource domains, used by the
//! orchestrator and handler tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use botgrid_queue::{QueueError, QueueResult, TopicAdmin};
use botgrid_state::{naming, BotRecord};
use botgrid_telegram::{BotApi, TelegramError, TelegramResult};
use botgrid_workload::{WorkloadBackend, WorkloadError, WorkloadResult};

fn queue_error(message: &str) -> QueueError {
    QueueError::Admin {
        topic: "test".to_string(),
        message: message.to_string(),
    }
}

fn workload_error() -> WorkloadError {
    // Any constructible variant works for failure injection.
    serde_json::from_str::<Value>("").unwrap_err().into()
}

fn telegram_error(description: &str) -> TelegramError {
    TelegramError::Api {
        code: 500,
        description: description.to_string(),
    }
}

/// Recording fake for the queue cluster.
#[derive(Default)]
pub struct FakeTopicAdmin {
    /// Bot ids whose topic pairs currently exist.
    pub created: Mutex<HashSet<String>>,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Lag reported for every group.
    pub lag: AtomicI64,
}

#[async_trait]
impl TopicAdmin for FakeTopicAdmin {
    async fn create_bot_topics(&self, bot_id: &str) -> QueueResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(queue_error("injected create failure"));
        }
        self.created.lock().unwrap().insert(bot_id.to_string());
        Ok(())
    }

    async fn delete_bot_topics(&self, bot_id: &str) -> QueueResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(queue_error("injected delete failure"));
        }
        self.created.lock().unwrap().remove(bot_id);
        Ok(())
    }

    async fn list_topics(&self) -> QueueResult<Vec<String>> {
        let mut topics = Vec::new();
        for bot_id in self.created.lock().unwrap().iter() {
            let pair = naming::topic_pair(bot_id);
            topics.push(pair.incoming);
            topics.push(pair.outgoing);
        }
        Ok(topics)
    }

    async fn consumer_lag(&self, _topic: &str, _group: &str) -> QueueResult<i64> {
        Ok(self.lag.load(Ordering::SeqCst))
    }
}

/// Recording fake for the workload orchestrator.
#[derive(Default)]
pub struct FakeWorkloads {
    pub workloads: Mutex<HashSet<String>>,
    pub scalers: Mutex<HashSet<String>>,
    /// Last bounds patch per bot id.
    pub bounds: Mutex<HashMap<String, (Option<u32>, Option<u32>)>>,
    pub ready: AtomicU32,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_ready: AtomicBool,
    /// CA certificate served by `read_ca_secret`.
    pub ca_cert: Mutex<Option<Vec<u8>>>,
}

#[async_trait]
impl WorkloadBackend for FakeWorkloads {
    async fn create_bot_workload(
        &self,
        record: &BotRecord,
        _kafka_brokers: &str,
    ) -> WorkloadResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(workload_error());
        }
        self.workloads.lock().unwrap().insert(record.bot_id.clone());
        Ok(())
    }

    async fn delete_bot_workload(&self, bot_id: &str) -> WorkloadResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(workload_error());
        }
        self.workloads.lock().unwrap().remove(bot_id);
        Ok(())
    }

    async fn ready_replicas(&self, _bot_id: &str) -> WorkloadResult<u32> {
        if self.fail_ready.load(Ordering::SeqCst) {
            return Err(workload_error());
        }
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn create_scaler(&self, record: &BotRecord, _kafka_brokers: &str) -> WorkloadResult<()> {
        self.scalers.lock().unwrap().insert(record.bot_id.clone());
        Ok(())
    }

    async fn delete_scaler(&self, bot_id: &str) -> WorkloadResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(workload_error());
        }
        self.scalers.lock().unwrap().remove(bot_id);
        Ok(())
    }

    async fn update_scaler_bounds(
        &self,
        bot_id: &str,
        min_replicas: Option<u32>,
        max_replicas: Option<u32>,
    ) -> WorkloadResult<()> {
        self.bounds
            .lock()
            .unwrap()
            .insert(bot_id.to_string(), (min_replicas, max_replicas));
        Ok(())
    }

    async fn read_ca_secret(&self, name: &str) -> WorkloadResult<Vec<u8>> {
        self.ca_cert
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| WorkloadError::MissingSecretKey {
                name: name.to_string(),
                key: "ca.crt".to_string(),
            })
    }

    async fn ping(&self) -> WorkloadResult<()> {
        Ok(())
    }
}

/// Recording fake for the Telegram API.
#[derive(Default)]
pub struct FakeTelegram {
    /// Registered webhooks: token → url.
    pub webhooks: Mutex<HashMap<String, String>>,
    pub fail_set_webhook: AtomicBool,
}

#[async_trait]
impl BotApi for FakeTelegram {
    async fn set_webhook(
        &self,
        bot_token: &str,
        webhook_url: &str,
        _ca_cert: Option<Vec<u8>>,
    ) -> TelegramResult<()> {
        if self.fail_set_webhook.load(Ordering::SeqCst) {
            return Err(telegram_error("injected webhook failure"));
        }
        self.webhooks
            .lock()
            .unwrap()
            .insert(bot_token.to_string(), webhook_url.to_string());
        Ok(())
    }

    async fn delete_webhook(&self, bot_token: &str) -> TelegramResult<()> {
        self.webhooks.lock().unwrap().remove(bot_token);
        Ok(())
    }

    async fn call_method(
        &self,
        _bot_token: &str,
        _method: &str,
        _params: Option<&Value>,
    ) -> TelegramResult<Value> {
        Ok(Value::Null)
    }
}

/// The three fakes bundled for test setup.
pub struct Fakes {
    pub topics: Arc<FakeTopicAdmin>,
    pub workloads: Arc<FakeWorkloads>,
    pub telegram: Arc<FakeTelegram>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(FakeTopicAdmin::default()),
            workloads: Arc::new(FakeWorkloads::default()),
            telegram: Arc::new(FakeTelegram::default()),
        }
    }
}
