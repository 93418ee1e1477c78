//! botgrid-telegram — HTTP client for the Telegram Bot API.
//!
//! Two concerns: webhook registration for the lifecycle orchestrator,
//! and dynamic `(method, params)` dispatch for the egress gateway. The
//! API has hundreds of methods; they are all called the same way, so no
//! per-method bindings exist.

pub mod client;

use thiserror::Error;

pub use client::{BotApi, TelegramClient};

/// Result type alias for Telegram API calls.
pub type TelegramResult<T> = Result<T, TelegramError>;

/// Errors from the Telegram Bot API or the transport underneath it.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("telegram returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("telegram api error [{code}]: {description}")]
    Api { code: i64, description: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}
