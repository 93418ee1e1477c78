//! botgrid-workload — Kubernetes resources for per-bot workers.
//!
//! Each bot owns three cluster objects: a secret with its token and
//! user env vars, a two-container deployment (worker + sidecar,
//! starting at zero replicas), and a KEDA ScaledObject scaling the
//! deployment on ingress-queue consumer lag. Object manifests are
//! built by pure functions in `manifests` so their shape is testable
//! without a cluster.

pub mod backend;
pub mod manifests;

use thiserror::Error;

pub use backend::{KubeWorkloads, WorkloadBackend};

/// Result type alias for workload orchestrator operations.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Errors against the workload orchestrator.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("kubernetes client error: {0}")]
    Client(#[from] kube::Error),

    #[error("manifest construction error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("secret {name} has no {key} entry")]
    MissingSecretKey { name: String, key: String },
}
