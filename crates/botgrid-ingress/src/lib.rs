//! botgrid-ingress — the webhook receiver in front of the bot fleet.
//!
//! Telegram posts updates to `/webhook/{bot_token}`; the router resolves
//! the token to a bot id, wraps the update in an envelope, and publishes
//! it to that bot's ingress topic keyed by `update_id`. Health endpoints
//! never touch dependencies.

pub mod router;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use botgrid_metrics::Metrics;
use botgrid_queue::Publisher;
use botgrid_state::BotStore;

/// Shared state for the webhook handler.
#[derive(Clone)]
pub struct IngressState {
    pub store: Arc<dyn BotStore>,
    pub publisher: Arc<dyn Publisher>,
    pub metrics: Arc<Metrics>,
}

/// Build the ingress router.
pub fn build_router(
    store: Arc<dyn BotStore>,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<Metrics>,
) -> Router {
    let state = IngressState {
        store,
        publisher,
        metrics,
    };

    Router::new()
        .route("/webhook/{bot_token}", post(router::handle_webhook))
        .route("/health", get(router::health))
        .route("/ready", get(router::ready))
        .with_state(state)
}
