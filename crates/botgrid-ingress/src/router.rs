//! The webhook hot path.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, error};

use botgrid_metrics::Metrics;
use botgrid_state::{mask_token, naming, InboundEnvelope, TelegramUpdate};

use crate::IngressState;

/// POST /webhook/{bot_token}
///
/// 400 on an empty token or unparsable update, 404 on an unknown token,
/// 500 on publish failure, otherwise 200 `"ok"`.
pub async fn handle_webhook(
    State(state): State<IngressState>,
    Path(bot_token): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    Metrics::incr(&state.metrics.updates_received);

    if bot_token.is_empty() {
        Metrics::incr(&state.metrics.updates_rejected);
        return (StatusCode::BAD_REQUEST, "bot_token is required").into_response();
    }

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            error!(token = %mask_token(&bot_token), error = %e, "unparsable update body");
            Metrics::incr(&state.metrics.updates_rejected);
            return (StatusCode::BAD_REQUEST, "invalid json").into_response();
        }
    };

    let bot_id = match state.store.bot_id_for_token(&bot_token).await {
        Ok(Some(bot_id)) => bot_id,
        Ok(None) => {
            error!(token = %mask_token(&bot_token), "unknown bot token");
            Metrics::incr(&state.metrics.updates_rejected);
            return (StatusCode::NOT_FOUND, "bot not found").into_response();
        }
        Err(e) => {
            error!(token = %mask_token(&bot_token), error = %e, "token lookup failed");
            Metrics::incr(&state.metrics.updates_rejected);
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    let topic = naming::ingress_topic(&bot_id);
    // Keying by update id spreads load across partitions while keeping
    // redeliveries of the same update on one partition.
    let key = update.update_id.to_string();
    let envelope = InboundEnvelope {
        bot_id: bot_id.clone(),
        update,
    };
    let payload = match serde_json::to_vec(&envelope) {
        Ok(payload) => payload,
        Err(e) => {
            error!(%bot_id, error = %e, "envelope encode failed");
            Metrics::incr(&state.metrics.updates_rejected);
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    if let Err(e) = state.publisher.publish(&topic, &key, &payload).await {
        error!(%bot_id, %topic, error = %e, "publish failed");
        Metrics::incr(&state.metrics.updates_rejected);
        return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
    }

    Metrics::incr(&state.metrics.updates_published);
    debug!(%bot_id, update_id = %key, "webhook processed");
    (StatusCode::OK, "ok").into_response()
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// GET /ready
pub async fn ready() -> &'static str {
    "ready"
}
