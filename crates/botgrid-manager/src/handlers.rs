//! Control-plane API handlers.
//!
//! Each handler delegates to the `Orchestrator` and maps its errors
//! onto status codes: validation → 400, unknown bot → 404, duplicate
//! token → 409, anything external → 500.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::error;

use botgrid_metrics::Metrics;
use botgrid_state::{CreateBotRequest, UpdateReplicasRequest};

use crate::orchestrator::OrchestratorError;
use crate::AppState;

fn error_response(err: &OrchestratorError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": err.to_string()})))
}

/// POST /bots
pub async fn create_bot(
    State(state): State<AppState>,
    Json(req): Json<CreateBotRequest>,
) -> impl IntoResponse {
    match state.orchestrator.create_bot(req).await {
        Ok(response) => {
            Metrics::incr(&state.metrics.bots_created);
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to create bot");
            error_response(&e).into_response()
        }
    }
}

/// GET /bots
pub async fn list_bots(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.list_bots().await {
        Ok(bots) => Json(bots).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list bots");
            error_response(&e).into_response()
        }
    }
}

/// GET /bots/{bot_id}
pub async fn get_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.get_bot(&bot_id).await {
        Ok(bot) => Json(bot).into_response(),
        Err(e) => {
            error!(%bot_id, error = %e, "failed to get bot");
            error_response(&e).into_response()
        }
    }
}

/// DELETE /bots/{bot_id}
pub async fn delete_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.delete_bot(&bot_id).await {
        Ok(()) => {
            Metrics::incr(&state.metrics.bots_deleted);
            Json(json!({"message": "bot deleted"})).into_response()
        }
        Err(e) => {
            error!(%bot_id, error = %e, "failed to delete bot");
            error_response(&e).into_response()
        }
    }
}

/// PATCH /bots/{bot_id}/replicas
pub async fn update_replicas(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    Json(req): Json<UpdateReplicasRequest>,
) -> impl IntoResponse {
    match state.orchestrator.update_replicas(&bot_id, &req).await {
        Ok(()) => Json(json!({"message": "replicas updated"})).into_response(),
        Err(e) => {
            error!(%bot_id, error = %e, "failed to update replicas");
            error_response(&e).into_response()
        }
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// GET /ready
pub async fn ready() -> &'static str {
    "ready"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{Orchestrator, OrchestratorConfig};
    use crate::testing::Fakes;
    use std::sync::Arc;

    fn test_state(fakes: &Fakes) -> AppState {
        let orchestrator = Orchestrator::new(
            Arc::new(botgrid_state::MemoryStore::new()),
            fakes.topics.clone(),
            fakes.workloads.clone(),
            fakes.telegram.clone(),
            OrchestratorConfig {
                gateway_url: "https://gw.example.com".to_string(),
                kafka_brokers: "kafka:9092".to_string(),
                tls_ca_secret_name: None,
                default_worker_image: None,
            },
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            metrics: Metrics::new(),
        }
    }

    fn create_request(token: &str) -> CreateBotRequest {
        CreateBotRequest {
            bot_token: token.to_string(),
            bot_name: "echo".to_string(),
            worker_image: "registry/echo:1".to_string(),
            min_replicas: 0,
            max_replicas: 2,
            env_vars: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_returns_created() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let resp = create_bot(State(state.clone()), Json(create_request("T")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            state
                .metrics
                .bots_created
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn create_invalid_returns_bad_request() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let mut req = create_request("T");
        req.bot_name.clear();
        let resp = create_bot(State(state), Json(req)).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_duplicate_token_returns_conflict() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let resp = create_bot(State(state.clone()), Json(create_request("T")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = create_bot(State(state), Json(create_request("T")))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn get_unknown_returns_not_found() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let resp = get_bot(State(state), Path("bot_missing".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_ok_when_empty() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let resp = list_bots(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_twice_returns_ok_both_times() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let response = state
            .orchestrator
            .create_bot(create_request("T"))
            .await
            .unwrap();

        let resp = delete_bot(State(state.clone()), Path(response.bot_id.clone()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = delete_bot(State(state), Path(response.bot_id))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn update_replicas_returns_ok() {
        let fakes = Fakes::new();
        let state = test_state(&fakes);

        let response = state
            .orchestrator
            .create_bot(create_request("T"))
            .await
            .unwrap();

        let req = UpdateReplicasRequest {
            min_replicas: None,
            max_replicas: Some(5),
        };
        let resp = update_replicas(State(state.clone()), Path(response.bot_id.clone()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let bot = state.orchestrator.get_bot(&response.bot_id).await.unwrap();
        assert_eq!(bot.replicas.max, 5);
    }

    #[tokio::test]
    async fn health_endpoints_are_static() {
        assert_eq!(health().await, "ok");
        assert_eq!(ready().await, "ready");
    }
}
