//! botgridd — the botgrid daemon.
//!
//! Single binary that runs one of three services:
//!
//! - **manager** — control-plane API and bot lifecycle orchestration
//! - **ingress** — HTTPS receiver for Telegram webhooks
//! - **egress** — consumer of all per-bot egress topics
//!
//! # Usage
//!
//! ```text
//! botgridd manager
//! botgridd ingress
//! botgridd egress
//! ```
//!
//! Configuration comes from the environment (PORT, METRICS_PORT,
//! LOG_LEVEL, KAFKA_BROKERS, REDIS_ADDR, ...); see `config`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use botgrid_egress::FanoutProcessor;
use botgrid_manager::{Orchestrator, OrchestratorConfig};
use botgrid_metrics::Metrics;
use botgrid_queue::{KafkaAdmin, KafkaProducer};
use botgrid_state::RedisStore;
use botgrid_telegram::TelegramClient;
use botgrid_workload::{KubeWorkloads, WorkloadBackend};

use config::{CommonConfig, GatewayConfig, ManagerConfig};

#[derive(Parser)]
#[command(name = "botgridd", about = "botgrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control-plane manager.
    Manager,
    /// Run the webhook ingress gateway.
    Ingress,
    /// Run the egress fan-out gateway.
    Egress,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Manager => run_manager(ManagerConfig::load()).await,
        Command::Ingress => run_ingress(GatewayConfig::load()).await,
        Command::Egress => run_egress(GatewayConfig::load()).await,
    }
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Flip the shutdown channel on SIGINT or SIGTERM.
fn spawn_signal_watcher(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Serve a router until the shutdown channel flips.
async fn serve(router: Router, port: u16, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

async fn connect_store(common: &CommonConfig) -> anyhow::Result<Arc<RedisStore>> {
    let store = RedisStore::connect(&common.redis_addr, &common.redis_password, common.redis_db)
        .await
        .context("failed to connect to key-value store")?;
    Ok(Arc::new(store))
}

async fn run_manager(cfg: ManagerConfig) -> anyhow::Result<()> {
    init_tracing(&cfg.common.log_level)?;
    info!(
        port = cfg.common.port,
        kafka_brokers = %cfg.common.kafka_brokers,
        namespace = %cfg.worker_namespace,
        "manager starting"
    );

    let store = connect_store(&cfg.common).await?;

    let topics = Arc::new(
        KafkaAdmin::new(&cfg.common.kafka_brokers).context("failed to build kafka admin")?,
    );

    let workloads = Arc::new(
        KubeWorkloads::connect(&cfg.worker_namespace, &cfg.sidecar_image)
            .await
            .context("failed to build kubernetes client")?,
    );
    workloads
        .ping()
        .await
        .context("failed to connect to kubernetes")?;

    let telegram = Arc::new(TelegramClient::new(&cfg.telegram_api_url));

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        topics,
        workloads,
        telegram,
        OrchestratorConfig {
            gateway_url: cfg.gateway_url.clone(),
            kafka_brokers: cfg.common.kafka_brokers.clone(),
            tls_ca_secret_name: cfg.tls_ca_secret_name.clone(),
            default_worker_image: cfg.default_worker_image.clone(),
        },
    ));

    let metrics = Metrics::new();
    let router = botgrid_manager::build_router(orchestrator, metrics.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_watcher(shutdown_tx);

    let metrics_handle = tokio::spawn(serve(
        botgrid_metrics::router(metrics),
        cfg.common.metrics_port,
        shutdown_rx.clone(),
    ));

    serve(router, cfg.common.port, shutdown_rx).await?;
    let _ = metrics_handle.await;

    info!("manager stopped");
    Ok(())
}

async fn run_ingress(cfg: GatewayConfig) -> anyhow::Result<()> {
    init_tracing(&cfg.common.log_level)?;
    info!(
        port = cfg.common.port,
        kafka_brokers = %cfg.common.kafka_brokers,
        "ingress gateway starting"
    );

    let store = connect_store(&cfg.common).await?;
    let publisher = Arc::new(
        KafkaProducer::new(&cfg.common.kafka_brokers).context("failed to build kafka producer")?,
    );

    let metrics = Metrics::new();
    let router = botgrid_ingress::build_router(store, publisher, metrics.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_watcher(shutdown_tx);

    let metrics_handle = tokio::spawn(serve(
        botgrid_metrics::router(metrics),
        cfg.common.metrics_port,
        shutdown_rx.clone(),
    ));

    serve(router, cfg.common.port, shutdown_rx).await?;
    let _ = metrics_handle.await;

    info!("ingress gateway stopped");
    Ok(())
}

async fn run_egress(cfg: GatewayConfig) -> anyhow::Result<()> {
    init_tracing(&cfg.common.log_level)?;
    info!(
        kafka_brokers = %cfg.common.kafka_brokers,
        telegram_api = %cfg.telegram_api_url,
        "egress gateway starting"
    );

    let admin = Arc::new(
        KafkaAdmin::new(&cfg.common.kafka_brokers).context("failed to build kafka admin")?,
    );
    let telegram = Arc::new(TelegramClient::new(&cfg.telegram_api_url));
    let metrics = Metrics::new();

    let processor = Arc::new(FanoutProcessor::new(
        &cfg.common.kafka_brokers,
        admin,
        telegram,
        metrics.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_watcher(shutdown_tx);

    let processor_task = processor.clone();
    let processor_shutdown = shutdown_rx.clone();
    let processor_handle = tokio::spawn(async move {
        processor_task.run(processor_shutdown).await;
    });

    let metrics_handle = tokio::spawn(serve(
        botgrid_metrics::router(metrics),
        cfg.common.metrics_port,
        shutdown_rx.clone(),
    ));

    let health_router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ready", get(|| async { "ready" }));
    serve(health_router, cfg.common.port, shutdown_rx).await?;

    let _ = processor_handle.await;
    let _ = metrics_handle.await;

    info!("egress gateway stopped");
    Ok(())
}
