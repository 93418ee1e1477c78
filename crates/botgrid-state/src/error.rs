//! Error types for the bot state store.

use thiserror::Error;

use crate::types::BotStatus;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to connect to key-value store: {0}")]
    Connect(String),

    #[error("key-value store error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("bot not found: {0}")]
    NotFound(String),

    #[error("illegal status transition: {from:?} -> {to:?}")]
    IllegalTransition { from: BotStatus, to: BotStatus },
}
