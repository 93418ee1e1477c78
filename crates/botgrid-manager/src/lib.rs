//! botgrid-manager — the bot lifecycle orchestrator and its HTTP API.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/bots` | Provision a bot |
//! | GET | `/bots` | List bot statuses |
//! | GET | `/bots/{bot_id}` | Get one bot's status |
//! | DELETE | `/bots/{bot_id}` | Tear a bot down |
//! | PATCH | `/bots/{bot_id}/replicas` | Update replica bounds |
//! | GET | `/health`, `/ready` | Liveness/readiness |

pub mod handlers;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use botgrid_metrics::Metrics;

pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, OrchestratorResult};

/// Shared state for the control-plane handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<Metrics>,
}

/// Build the control-plane router.
pub fn build_router(orchestrator: Arc<Orchestrator>, metrics: Arc<Metrics>) -> Router {
    let state = AppState {
        orchestrator,
        metrics,
    };

    Router::new()
        .route("/bots", post(handlers::create_bot).get(handlers::list_bots))
        .route(
            "/bots/{bot_id}",
            get(handlers::get_bot).delete(handlers::delete_bot),
        )
        .route("/bots/{bot_id}/replicas", patch(handlers::update_replicas))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .with_state(state)
}
