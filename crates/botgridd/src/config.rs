//! Environment-driven configuration.
//!
//! Every service reads the same family of keys; unset values fall back
//! to the defaults below.

use std::env;

fn get_env(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Keys shared by all three services.
#[derive(Debug, Clone)]
pub struct CommonConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub log_level: String,
    pub kafka_brokers: String,
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
}

impl CommonConfig {
    pub fn load() -> Self {
        Self {
            port: get_env("PORT", "8080").parse().unwrap_or(8080),
            metrics_port: get_env("METRICS_PORT", "9090").parse().unwrap_or(9090),
            log_level: get_env("LOG_LEVEL", "info"),
            kafka_brokers: get_env("KAFKA_BROKERS", "localhost:9092"),
            redis_addr: get_env("REDIS_ADDR", "localhost:6379"),
            redis_password: get_env("REDIS_PASSWORD", ""),
            redis_db: get_env("REDIS_DB", "0").parse().unwrap_or(0),
        }
    }
}

/// Manager-only keys.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub common: CommonConfig,
    pub gateway_url: String,
    pub worker_namespace: String,
    pub sidecar_image: String,
    pub default_worker_image: Option<String>,
    pub tls_ca_secret_name: Option<String>,
    pub telegram_api_url: String,
}

impl ManagerConfig {
    pub fn load() -> Self {
        Self {
            common: CommonConfig::load(),
            gateway_url: get_env("GATEWAY_URL", "http://botgrid-ingress:8080"),
            worker_namespace: get_env("WORKER_NAMESPACE", "default"),
            sidecar_image: get_env("SIDECAR_IMAGE", "botgrid/sidecar:latest"),
            default_worker_image: get_env_opt("DEFAULT_WORKER_IMAGE"),
            tls_ca_secret_name: get_env_opt("TLS_CA_SECRET_NAME"),
            telegram_api_url: get_env("TELEGRAM_API_URL", "https://api.telegram.org"),
        }
    }
}

/// Gateway keys (ingress and egress).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: CommonConfig,
    pub telegram_api_url: String,
}

impl GatewayConfig {
    pub fn load() -> Self {
        Self {
            common: CommonConfig::load(),
            telegram_api_url: get_env("TELEGRAM_API_URL", "https://api.telegram.org"),
        }
    }
}
