//! BotStore — persistent bot records, token index, and bot set.
//!
//! Three key families live in the key-value store:
//!
//! - `bot:config:<bot_id>` → JSON `BotRecord`
//! - `bot:token:<bot_token>` → `<bot_id>`
//! - `bots:all` → set of bot ids
//!
//! `save_bot` and `delete_bot` touch all three as one pipelined update.
//! The store supports a Redis backend and an in-memory backend (the
//! latter for testing).

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::naming;
use crate::types::{BotRecord, BotStatus};

/// Persistent store for bot records and the token index.
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Insert or update a record together with its token index entry
    /// and bot-set membership.
    async fn save_bot(&self, record: &BotRecord) -> StateResult<()>;

    /// Get a record by bot id.
    async fn get_bot(&self, bot_id: &str) -> StateResult<Option<BotRecord>>;

    /// Remove the record, token index entry, and set membership in one
    /// pipelined update. Removing an absent bot is a no-op.
    async fn delete_bot(&self, bot_id: &str, bot_token: &str) -> StateResult<()>;

    /// All known bot ids.
    async fn list_bot_ids(&self) -> StateResult<Vec<String>>;

    /// Resolve a token to its bot id.
    async fn bot_id_for_token(&self, bot_token: &str) -> StateResult<Option<String>>;

    /// Load-modify-save of the record's status. Rejects transitions the
    /// status machine does not allow.
    async fn update_status(&self, bot_id: &str, status: BotStatus) -> StateResult<()>;

    /// Liveness check against the backend.
    async fn ping(&self) -> StateResult<()>;
}

// ── Redis backend ─────────────────────────────────────────────────

/// Redis-backed store. `ConnectionManager` multiplexes and reconnects,
/// so the store is cheap to clone and safe to share.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and ping. Fails fast when the store is unreachable.
    pub async fn connect(addr: &str, password: &str, db: i64) -> StateResult<Self> {
        let url = if password.is_empty() {
            format!("redis://{addr}/{db}")
        } else {
            format!("redis://:{password}@{addr}/{db}")
        };
        let client = redis::Client::open(url).map_err(|e| StateError::Connect(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StateError::Connect(e.to_string()))?;
        let store = Self { conn };
        store.ping().await?;
        debug!(%addr, db, "bot store connected");
        Ok(store)
    }
}

#[async_trait]
impl BotStore for RedisStore {
    async fn save_bot(&self, record: &BotRecord) -> StateResult<()> {
        let data = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .set(naming::config_key(&record.bot_id), data)
            .ignore()
            .set(naming::token_key(&record.bot_token), &record.bot_id)
            .ignore()
            .sadd(naming::BOTS_SET_KEY, &record.bot_id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        debug!(bot_id = %record.bot_id, status = ?record.status, "bot record stored");
        Ok(())
    }

    async fn get_bot(&self, bot_id: &str) -> StateResult<Option<BotRecord>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(naming::config_key(bot_id)).await?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete_bot(&self, bot_id: &str, bot_token: &str) -> StateResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .del(naming::config_key(bot_id))
            .ignore()
            .del(naming::token_key(bot_token))
            .ignore()
            .srem(naming::BOTS_SET_KEY, bot_id)
            .ignore()
            .query_async(&mut conn)
            .await?;
        debug!(%bot_id, "bot record deleted");
        Ok(())
    }

    async fn list_bot_ids(&self) -> StateResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(naming::BOTS_SET_KEY).await?;
        Ok(ids)
    }

    async fn bot_id_for_token(&self, bot_token: &str) -> StateResult<Option<String>> {
        let mut conn = self.conn.clone();
        let id: Option<String> = conn.get(naming::token_key(bot_token)).await?;
        Ok(id)
    }

    async fn update_status(&self, bot_id: &str, status: BotStatus) -> StateResult<()> {
        let mut record = self
            .get_bot(bot_id)
            .await?
            .ok_or_else(|| StateError::NotFound(bot_id.to_string()))?;
        if !record.status.can_transition(status) {
            return Err(StateError::IllegalTransition {
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.updated_at = chrono::Utc::now();
        self.save_bot(&record).await
    }

    async fn ping(&self) -> StateResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

// ── In-memory backend ─────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, BotRecord>,
    tokens: HashMap<String, String>,
    ids: BTreeSet<String>,
}

/// Ephemeral in-memory store (for testing).
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bot-set member without a backing record, simulating a
    /// half-cleaned store.
    pub fn insert_phantom_id(&self, bot_id: &str) {
        self.inner.lock().unwrap().ids.insert(bot_id.to_string());
    }

    /// Every stored key mentioning the given id or token, for asserting
    /// cleanup in tests.
    pub fn keys_mentioning(&self, needle: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut keys = Vec::new();
        for id in inner.records.keys() {
            if naming::config_key(id).contains(needle) {
                keys.push(naming::config_key(id));
            }
        }
        for token in inner.tokens.keys() {
            if naming::token_key(token).contains(needle) {
                keys.push(naming::token_key(token));
            }
        }
        for id in &inner.ids {
            if id.contains(needle) {
                keys.push(format!("{}:{id}", naming::BOTS_SET_KEY));
            }
        }
        keys
    }
}

#[async_trait]
impl BotStore for MemoryStore {
    async fn save_bot(&self, record: &BotRecord) -> StateResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .insert(record.bot_id.clone(), record.clone());
        inner
            .tokens
            .insert(record.bot_token.clone(), record.bot_id.clone());
        inner.ids.insert(record.bot_id.clone());
        Ok(())
    }

    async fn get_bot(&self, bot_id: &str) -> StateResult<Option<BotRecord>> {
        Ok(self.inner.lock().unwrap().records.get(bot_id).cloned())
    }

    async fn delete_bot(&self, bot_id: &str, bot_token: &str) -> StateResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.remove(bot_id);
        inner.tokens.remove(bot_token);
        inner.ids.remove(bot_id);
        Ok(())
    }

    async fn list_bot_ids(&self) -> StateResult<Vec<String>> {
        Ok(self.inner.lock().unwrap().ids.iter().cloned().collect())
    }

    async fn bot_id_for_token(&self, bot_token: &str) -> StateResult<Option<String>> {
        Ok(self.inner.lock().unwrap().tokens.get(bot_token).cloned())
    }

    async fn update_status(&self, bot_id: &str, status: BotStatus) -> StateResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .get_mut(bot_id)
            .ok_or_else(|| StateError::NotFound(bot_id.to_string()))?;
        if !record.status.can_transition(status) {
            return Err(StateError::IllegalTransition {
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn ping(&self) -> StateResult<()> {
        Ok(())
    }
}
