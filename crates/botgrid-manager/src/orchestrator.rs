//! Bot lifecycle orchestration.
//!
//! Translates a bot specification into side effects across four
//! externally-owned resource domains: the queue cluster, the workload
//! orchestrator, the Telegram API, and the key-value store. The create
//! path is a linear saga that fails fast and leaves a `failed` record
//! behind; the delete path is best-effort and tolerates every missing
//! resource, so operators can re-run it safely.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use botgrid_queue::{QueueError, TopicAdmin};
use botgrid_state::{
    mask_token, naming, BotRecord, BotStatus, BotStatusResponse, BotStore, CreateBotRequest,
    CreateBotResponse, Replicas, StateError, UpdateReplicasRequest,
};
use botgrid_telegram::{BotApi, TelegramError};
use botgrid_workload::{WorkloadBackend, WorkloadError};

/// Result type alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors surfaced to the control-plane API.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("bot not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StateError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error(transparent)]
    Telegram(#[from] TelegramError),
}

/// Static configuration of the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Public base URL of the ingress gateway.
    pub gateway_url: String,
    /// Broker list handed to workloads and scalers.
    pub kafka_brokers: String,
    /// Secret holding a CA certificate for self-signed gateway TLS.
    pub tls_ca_secret_name: Option<String>,
    /// Image used when a create request leaves `worker_image` empty.
    pub default_worker_image: Option<String>,
}

/// The lifecycle orchestrator owned by the manager service.
pub struct Orchestrator {
    store: Arc<dyn BotStore>,
    topics: Arc<dyn TopicAdmin>,
    workloads: Arc<dyn WorkloadBackend>,
    telegram: Arc<dyn BotApi>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn BotStore>,
        topics: Arc<dyn TopicAdmin>,
        workloads: Arc<dyn WorkloadBackend>,
        telegram: Arc<dyn BotApi>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            topics,
            workloads,
            telegram,
            config,
        }
    }

    /// Provision a new bot: record, topic pair, workload, scaler,
    /// webhook. Any failure before the webhook step marks the record
    /// `failed` and surfaces the error; the caller cleans up with
    /// `delete_bot`.
    pub async fn create_bot(
        &self,
        mut req: CreateBotRequest,
    ) -> OrchestratorResult<CreateBotResponse> {
        if req.worker_image.is_empty() {
            if let Some(image) = &self.config.default_worker_image {
                req.worker_image = image.clone();
            }
        }
        req.validate().map_err(OrchestratorError::Validation)?;

        if let Some(existing) = self.store.bot_id_for_token(&req.bot_token).await? {
            warn!(bot_id = %existing, token = %mask_token(&req.bot_token), "token already registered");
            return Err(OrchestratorError::Conflict(
                "bot_token is already registered".to_string(),
            ));
        }

        let bot_id = naming::generate_bot_id();
        let now = chrono::Utc::now();
        let record = BotRecord {
            bot_id: bot_id.clone(),
            bot_token: req.bot_token.clone(),
            bot_name: req.bot_name.clone(),
            worker_image: req.worker_image.clone(),
            min_replicas: req.min_replicas,
            max_replicas: req.max_replicas,
            env_vars: req.env_vars.clone(),
            created_at: now,
            updated_at: now,
            status: BotStatus::Creating,
        };
        self.store.save_bot(&record).await?;

        info!(%bot_id, "creating bot topics");
        if let Err(e) = self.topics.create_bot_topics(&bot_id).await {
            self.mark_failed(&bot_id).await;
            return Err(e.into());
        }

        info!(%bot_id, "creating bot workload");
        if let Err(e) = self
            .workloads
            .create_bot_workload(&record, &self.config.kafka_brokers)
            .await
        {
            self.mark_failed(&bot_id).await;
            return Err(e.into());
        }

        info!(%bot_id, "creating bot scaler");
        if let Err(e) = self
            .workloads
            .create_scaler(&record, &self.config.kafka_brokers)
            .await
        {
            self.mark_failed(&bot_id).await;
            return Err(e.into());
        }

        let webhook_url = format!("{}/webhook/{}", self.config.gateway_url, req.bot_token);
        self.register_webhook(&bot_id, &req.bot_token, &webhook_url)
            .await;

        if let Err(e) = self.store.update_status(&bot_id, BotStatus::Running).await {
            error!(%bot_id, error = %e, "failed to mark bot running");
        }

        info!(%bot_id, "bot created");
        Ok(CreateBotResponse {
            bot_id: bot_id.clone(),
            status: BotStatus::Running,
            kafka_topics: naming::topic_pair(&bot_id),
            webhook_url,
        })
    }

    /// Webhook registration is non-fatal: the bot stays reachable
    /// through worker pull and the webhook can be re-registered later.
    async fn register_webhook(&self, bot_id: &str, bot_token: &str, webhook_url: &str) {
        if !self.config.gateway_url.starts_with("https://") {
            warn!(
                %bot_id,
                %webhook_url,
                "gateway url is not https, skipping webhook registration"
            );
            return;
        }

        let ca_cert = match &self.config.tls_ca_secret_name {
            Some(name) => match self.workloads.read_ca_secret(name).await {
                Ok(cert) => Some(cert),
                Err(e) => {
                    error!(secret = %name, error = %e, "failed to read ca certificate");
                    None
                }
            },
            None => None,
        };

        info!(%bot_id, %webhook_url, "registering webhook");
        if let Err(e) = self.telegram.set_webhook(bot_token, webhook_url, ca_cert).await {
            error!(%bot_id, error = %e, "failed to register webhook");
        }
    }

    async fn mark_failed(&self, bot_id: &str) {
        if let Err(e) = self.store.update_status(bot_id, BotStatus::Failed).await {
            error!(%bot_id, error = %e, "failed to mark bot failed");
        }
    }

    /// Tear down every derived resource, tolerating the ones already
    /// gone, then remove the record itself. Only the final removal is
    /// load-bearing; everything before it logs and continues.
    pub async fn delete_bot(&self, bot_id: &str) -> OrchestratorResult<()> {
        let record = match self.store.get_bot(bot_id).await? {
            Some(record) => record,
            // Re-running a completed delete is a no-op.
            None => return Ok(()),
        };

        if let Err(e) = self.store.update_status(bot_id, BotStatus::Deleting).await {
            warn!(%bot_id, error = %e, "failed to mark bot deleting");
        }

        info!(%bot_id, "removing webhook");
        if let Err(e) = self.telegram.delete_webhook(&record.bot_token).await {
            error!(%bot_id, error = %e, "failed to remove webhook");
        }

        info!(%bot_id, "removing scaler");
        if let Err(e) = self.workloads.delete_scaler(bot_id).await {
            error!(%bot_id, error = %e, "failed to remove scaler");
        }

        info!(%bot_id, "removing workload");
        if let Err(e) = self.workloads.delete_bot_workload(bot_id).await {
            error!(%bot_id, error = %e, "failed to remove workload");
        }

        info!(%bot_id, "removing topics");
        if let Err(e) = self.topics.delete_bot_topics(bot_id).await {
            error!(%bot_id, error = %e, "failed to remove topics");
        }

        self.store.delete_bot(bot_id, &record.bot_token).await?;
        info!(%bot_id, "bot deleted");
        Ok(())
    }

    /// Current status of one bot. Replica and lag lookups degrade to 0
    /// on error; the record itself must exist.
    pub async fn get_bot(&self, bot_id: &str) -> OrchestratorResult<BotStatusResponse> {
        let record = self
            .store
            .get_bot(bot_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(bot_id.to_string()))?;

        let current = match self.workloads.ready_replicas(bot_id).await {
            Ok(n) => n,
            Err(e) => {
                error!(%bot_id, error = %e, "failed to read ready replicas");
                0
            }
        };

        let lag = match self
            .topics
            .consumer_lag(&naming::ingress_topic(bot_id), &naming::worker_group(bot_id))
            .await
        {
            Ok(lag) => lag,
            Err(e) => {
                error!(%bot_id, error = %e, "failed to read consumer lag");
                0
            }
        };

        Ok(BotStatusResponse {
            bot_id: record.bot_id,
            bot_name: record.bot_name,
            status: record.status,
            replicas: Replicas {
                current,
                min: record.min_replicas,
                max: record.max_replicas,
            },
            kafka_lag: lag,
            created_at: record.created_at,
        })
    }

    /// Status of every known bot. Entries whose lookup fails are logged
    /// and omitted, never fatal.
    pub async fn list_bots(&self) -> OrchestratorResult<Vec<BotStatusResponse>> {
        let ids = self.store.list_bot_ids().await?;
        let mut bots = Vec::with_capacity(ids.len());
        for bot_id in ids {
            match self.get_bot(&bot_id).await {
                Ok(bot) => bots.push(bot),
                Err(e) => error!(%bot_id, error = %e, "failed to read bot, omitting"),
            }
        }
        Ok(bots)
    }

    /// Update stored replica bounds, then patch the scaler. The two
    /// steps fail independently; partial application is visible in a
    /// subsequent get.
    pub async fn update_replicas(
        &self,
        bot_id: &str,
        req: &UpdateReplicasRequest,
    ) -> OrchestratorResult<()> {
        let mut record = self
            .store
            .get_bot(bot_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(bot_id.to_string()))?;

        if let Some(min) = req.min_replicas {
            record.min_replicas = min;
        }
        if let Some(max) = req.max_replicas {
            record.max_replicas = max;
        }
        record.updated_at = chrono::Utc::now();
        self.store.save_bot(&record).await?;

        self.workloads
            .update_scaler_bounds(bot_id, req.min_replicas, req.max_replicas)
            .await?;

        info!(%bot_id, min = ?req.min_replicas, max = ?req.max_replicas, "replica bounds updated");
        Ok(())
    }
}
