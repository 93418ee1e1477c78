//! Domain types for hosted bots.
//!
//! These types represent the persisted bot record, the control-plane
//! request/response bodies, and the JSON envelopes carried on the
//! per-bot ingress and egress queues. All types serialize to/from JSON.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a hosted bot (`bot_` + 16 hex chars).
pub type BotId = String;

// ── Bot record ────────────────────────────────────────────────────

/// Persisted configuration and status of a hosted bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotRecord {
    pub bot_id: BotId,
    /// Telegram bot token. Treated as a secret; never logged unmasked.
    pub bot_token: String,
    pub bot_name: String,
    /// Container image running the user's bot logic.
    pub worker_image: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Extra environment injected into the worker container.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env_vars: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: BotStatus,
}

/// Lifecycle status of a bot.
///
/// Legal transitions: `creating → running`, `creating → failed`,
/// `running → deleting`, `failed → deleting`. A record in `deleting`
/// only leaves that state by being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Creating,
    Running,
    Failed,
    Deleting,
}

impl BotStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    /// Same-state writes are allowed as no-ops (a re-run `Delete` marks
    /// `deleting` again).
    pub fn can_transition(self, next: BotStatus) -> bool {
        use BotStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Creating, Running) | (Creating, Failed) | (Running, Deleting) | (Failed, Deleting)
        )
    }
}

// ── Control-plane requests and responses ──────────────────────────

/// Body of `POST /bots`. Every field is defaulted so that missing
/// fields land in `validate`, which names the offender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBotRequest {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub bot_name: String,
    #[serde(default)]
    pub worker_image: String,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default)]
    pub max_replicas: u32,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

impl CreateBotRequest {
    /// Validate the request, returning the message for the first failing
    /// field. Runs before any side effect.
    pub fn validate(&self) -> Result<(), String> {
        if self.bot_token.is_empty() {
            return Err("bot_token is required".into());
        }
        if self.bot_name.is_empty() {
            return Err("bot_name is required".into());
        }
        if self.worker_image.is_empty() {
            return Err("worker_image is required".into());
        }
        if self.max_replicas < 1 {
            return Err("max_replicas must be >= 1".into());
        }
        if self.min_replicas > self.max_replicas {
            return Err("min_replicas must be <= max_replicas".into());
        }
        Ok(())
    }
}

/// Body of a successful `POST /bots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBotResponse {
    pub bot_id: BotId,
    pub status: BotStatus,
    pub kafka_topics: TopicPair,
    pub webhook_url: String,
}

/// The per-bot queue topology, derived from the bot id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicPair {
    pub incoming: String,
    pub outgoing: String,
}

/// Body of `PATCH /bots/{bot_id}/replicas`. Absent fields mean
/// "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReplicasRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,
}

/// Body of `GET /bots/{bot_id}` and the elements of `GET /bots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatusResponse {
    pub bot_id: BotId,
    pub bot_name: String,
    pub status: BotStatus,
    pub replicas: Replicas,
    pub kafka_lag: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Replicas {
    /// Ready replicas as reported by the workload orchestrator.
    pub current: u32,
    pub min: u32,
    pub max: u32,
}

// ── Queue envelopes ───────────────────────────────────────────────

/// A Telegram update. Only `update_id` is interpreted; everything else
/// passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

/// Envelope published to a bot's ingress topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundEnvelope {
    pub bot_id: BotId,
    pub update: TelegramUpdate,
}

/// Worker-initiated Telegram API call, consumed from a bot's egress
/// topic. `method` is dispatched dynamically; no closed method set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundCommand {
    pub bot_token: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

// ── Token masking ─────────────────────────────────────────────────

/// Mask a bot token for logging: first five and last five characters
/// when the token is long enough, `"***"` otherwise.
pub fn mask_token(token: &str) -> String {
    if token.len() < 10 {
        return "***".to_string();
    }
    format!("{}***{}", &token[..5], &token[token.len() - 5..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateBotRequest {
        CreateBotRequest {
            bot_token: "123456:ABC-DEF".to_string(),
            bot_name: "echo".to_string(),
            worker_image: "registry/echo:1".to_string(),
            min_replicas: 0,
            max_replicas: 1,
            env_vars: HashMap::new(),
        }
    }

    #[test]
    fn validate_accepts_min_zero_max_one() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let mut req = valid_request();
        req.bot_token.clear();
        assert_eq!(req.validate().unwrap_err(), "bot_token is required");

        let mut req = valid_request();
        req.bot_name.clear();
        assert_eq!(req.validate().unwrap_err(), "bot_name is required");

        let mut req = valid_request();
        req.worker_image.clear();
        assert_eq!(req.validate().unwrap_err(), "worker_image is required");
    }

    #[test]
    fn validate_rejects_bad_replica_bounds() {
        let mut req = valid_request();
        req.max_replicas = 0;
        assert_eq!(req.validate().unwrap_err(), "max_replicas must be >= 1");

        let mut req = valid_request();
        req.min_replicas = 2;
        req.max_replicas = 1;
        assert_eq!(
            req.validate().unwrap_err(),
            "min_replicas must be <= max_replicas"
        );
    }

    #[test]
    fn status_transitions() {
        use BotStatus::*;
        assert!(Creating.can_transition(Running));
        assert!(Creating.can_transition(Failed));
        assert!(Running.can_transition(Deleting));
        assert!(Failed.can_transition(Deleting));
        // Re-marking the same status is a no-op, not an error.
        assert!(Deleting.can_transition(Deleting));

        assert!(!Running.can_transition(Creating));
        assert!(!Deleting.can_transition(Running));
        assert!(!Failed.can_transition(Running));
        assert!(!Running.can_transition(Failed));
    }

    #[test]
    fn mask_token_short_and_long() {
        assert_eq!(mask_token(""), "***");
        assert_eq!(mask_token("123456789"), "***");
        assert_eq!(mask_token("1234567890"), "12345***67890");
        assert_eq!(mask_token("110201543:AAHdqTcv"), "11020***dqTcv");
    }

    #[test]
    fn update_survives_decode_encode() {
        let raw = serde_json::json!({
            "update_id": 42,
            "message": {"message_id": 7, "text": "hi", "chat": {"id": 1}}
        });
        let update: TelegramUpdate = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(update.update_id, 42);
        assert_eq!(serde_json::to_value(&update).unwrap(), raw);
    }

    #[test]
    fn outbound_command_round_trip() {
        let raw = serde_json::json!({
            "bot_token": "T",
            "method": "sendMessage",
            "params": {"chat_id": 1, "text": "hi"}
        });
        let cmd: OutboundCommand = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&cmd).unwrap(), raw);

        // Absent params stay absent.
        let bare = serde_json::json!({"bot_token": "T", "method": "getMe"});
        let cmd: OutboundCommand = serde_json::from_value(bare.clone()).unwrap();
        assert!(cmd.params.is_none());
        assert_eq!(serde_json::to_value(&cmd).unwrap(), bare);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&BotStatus::Creating).unwrap(),
            "\"creating\""
        );
        assert_eq!(
            serde_json::from_str::<BotStatus>("\"deleting\"").unwrap(),
            BotStatus::Deleting
        );
    }
}
