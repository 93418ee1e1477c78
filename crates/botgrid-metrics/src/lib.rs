//! botgrid-metrics — process counters and their Prometheus exposition.
//!
//! Every service binds a second listener on its metrics port and serves
//! `GET /metrics` in the Prometheus text exposition format. Counters are
//! plain atomics; rendering is done by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

/// Process-wide counters. Each service increments only the counters it
/// owns; the rest render as zero.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Webhook requests accepted by the ingress router.
    pub updates_received: AtomicU64,
    /// Envelopes successfully published to an ingress topic.
    pub updates_published: AtomicU64,
    /// Webhook requests rejected (bad body, unknown token, publish failure).
    pub updates_rejected: AtomicU64,
    /// Egress commands dispatched to Telegram successfully.
    pub commands_processed: AtomicU64,
    /// Egress commands that failed decode or dispatch.
    pub commands_failed: AtomicU64,
    /// Bots successfully created by the manager.
    pub bots_created: AtomicU64,
    /// Bots deleted by the manager.
    pub bots_deleted: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all counters in Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut counter = |name: &str, help: &str, value: u64| {
            out.push_str(&format!("# HELP {name} {help}\n"));
            out.push_str(&format!("# TYPE {name} counter\n"));
            out.push_str(&format!("{name} {value}\n"));
        };

        counter(
            "botgrid_updates_received_total",
            "Webhook requests accepted by the ingress router.",
            self.updates_received.load(Ordering::Relaxed),
        );
        counter(
            "botgrid_updates_published_total",
            "Envelopes published to ingress topics.",
            self.updates_published.load(Ordering::Relaxed),
        );
        counter(
            "botgrid_updates_rejected_total",
            "Webhook requests rejected.",
            self.updates_rejected.load(Ordering::Relaxed),
        );
        counter(
            "botgrid_commands_processed_total",
            "Egress commands dispatched to Telegram.",
            self.commands_processed.load(Ordering::Relaxed),
        );
        counter(
            "botgrid_commands_failed_total",
            "Egress commands that failed decode or dispatch.",
            self.commands_failed.load(Ordering::Relaxed),
        );
        counter(
            "botgrid_bots_created_total",
            "Bots created by the manager.",
            self.bots_created.load(Ordering::Relaxed),
        );
        counter(
            "botgrid_bots_deleted_total",
            "Bots deleted by the manager.",
            self.bots_deleted.load(Ordering::Relaxed),
        );

        out
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render(),
    )
}

/// Build the metrics router served on the metrics port.
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_has_all_counters_at_zero() {
        let metrics = Metrics::new();
        let out = metrics.render();
        assert!(out.contains("botgrid_updates_received_total 0"));
        assert!(out.contains("botgrid_commands_processed_total 0"));
        assert!(out.contains("botgrid_bots_created_total 0"));
    }

    #[test]
    fn incremented_counter_renders_value() {
        let metrics = Metrics::new();
        Metrics::incr(&metrics.updates_received);
        Metrics::incr(&metrics.updates_received);
        assert!(metrics.render().contains("botgrid_updates_received_total 2"));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let metrics = Metrics::new();
        for line in metrics.render().lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let name = parts.next().unwrap();
            assert!(name.starts_with("botgrid_"));
            assert!(parts.next().unwrap().parse::<u64>().is_ok());
        }
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_text() {
        let metrics = Metrics::new();
        let response = metrics_handler(State(metrics)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("text/plain"));
    }
}
