//! Manifest builders for per-bot cluster objects.

use serde_json::{json, Value};

use botgrid_state::{naming, BotRecord};

/// Sidecar HTTP port the worker talks to.
const SIDECAR_PORT: u16 = 8081;
/// Sidecar metrics port.
const SIDECAR_METRICS_PORT: u16 = 9091;
/// Queue lag per replica before the scaler adds one.
const LAG_THRESHOLD: &str = "5";
/// Scaler polling interval in seconds.
const POLLING_INTERVAL: u32 = 10;
/// Scaler cooldown in seconds.
const COOLDOWN_PERIOD: u32 = 30;

fn bot_labels(bot_id: &str) -> Value {
    json!({
        "app": "telegram-bot",
        "bot-id": bot_id,
    })
}

/// Secret carrying the bot token plus every user env var; the worker
/// container imports the whole secret as environment.
pub fn bot_secret(record: &BotRecord, namespace: &str) -> Value {
    let mut string_data = serde_json::Map::new();
    string_data.insert("BOT_TOKEN".to_string(), Value::String(record.bot_token.clone()));
    for (key, value) in &record.env_vars {
        string_data.insert(key.clone(), Value::String(value.clone()));
    }

    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": naming::secret_name(&record.bot_id),
            "namespace": namespace,
            "labels": bot_labels(&record.bot_id),
        },
        "type": "Opaque",
        "stringData": Value::Object(string_data),
    })
}

/// Two-container deployment: the user's worker image next to the fixed
/// sidecar image. Starts at zero replicas; the scaler owns the count.
pub fn bot_deployment(
    record: &BotRecord,
    namespace: &str,
    sidecar_image: &str,
    kafka_brokers: &str,
) -> Value {
    let pair = naming::topic_pair(&record.bot_id);

    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": naming::workload_name(&record.bot_id),
            "namespace": namespace,
            "labels": bot_labels(&record.bot_id),
        },
        "spec": {
            "replicas": 0,
            "selector": {"matchLabels": bot_labels(&record.bot_id)},
            "template": {
                "metadata": {"labels": bot_labels(&record.bot_id)},
                "spec": {
                    "restartPolicy": "Always",
                    "containers": [
                        {
                            "name": "bot",
                            "image": record.worker_image,
                            "env": [
                                {"name": "BOT_ID", "value": record.bot_id},
                                {"name": "BOT_TOKEN", "value": record.bot_token},
                                {"name": "SIDECAR_URL", "value": format!("http://localhost:{SIDECAR_PORT}")},
                            ],
                            "envFrom": [
                                {"secretRef": {"name": naming::secret_name(&record.bot_id)}}
                            ],
                        },
                        {
                            "name": "sidecar",
                            "image": sidecar_image,
                            "ports": [
                                {"name": "http", "containerPort": SIDECAR_PORT, "protocol": "TCP"},
                                {"name": "metrics", "containerPort": SIDECAR_METRICS_PORT, "protocol": "TCP"},
                            ],
                            "env": [
                                {"name": "PORT", "value": SIDECAR_PORT.to_string()},
                                {"name": "METRICS_PORT", "value": SIDECAR_METRICS_PORT.to_string()},
                                {"name": "LOG_LEVEL", "value": "info"},
                                {"name": "INCOMING_TOPIC", "value": pair.incoming},
                                {"name": "OUTGOING_TOPIC", "value": pair.outgoing},
                                {"name": "KAFKA_CONSUMER_GROUP", "value": naming::worker_group(&record.bot_id)},
                                {"name": "KAFKA_BROKERS", "value": kafka_brokers},
                                {"name": "BOT_TOKEN", "value": record.bot_token},
                            ],
                            "resources": {
                                "requests": {"cpu": "10m", "memory": "32Mi"},
                                "limits": {"cpu": "50m", "memory": "64Mi"},
                            },
                            "livenessProbe": {
                                "httpGet": {"path": "/health", "port": SIDECAR_PORT as i64},
                                "initialDelaySeconds": 5,
                                "periodSeconds": 10,
                            },
                            "readinessProbe": {
                                "httpGet": {"path": "/ready", "port": SIDECAR_PORT as i64},
                                "initialDelaySeconds": 3,
                                "periodSeconds": 5,
                            },
                        },
                    ],
                },
            },
        },
    })
}

/// KEDA ScaledObject scaling the bot's deployment on the lag of the
/// worker group against the ingress topic.
pub fn bot_scaler(record: &BotRecord, namespace: &str, kafka_brokers: &str) -> Value {
    json!({
        "apiVersion": "keda.sh/v1alpha1",
        "kind": "ScaledObject",
        "metadata": {
            "name": naming::scaler_name(&record.bot_id),
            "namespace": namespace,
            "labels": bot_labels(&record.bot_id),
        },
        "spec": {
            "scaleTargetRef": {"name": naming::workload_name(&record.bot_id)},
            "minReplicaCount": record.min_replicas,
            "maxReplicaCount": record.max_replicas,
            "pollingInterval": POLLING_INTERVAL,
            "cooldownPeriod": COOLDOWN_PERIOD,
            "triggers": [
                {
                    "type": "kafka",
                    "metadata": {
                        "bootstrapServers": kafka_brokers,
                        "consumerGroup": naming::worker_group(&record.bot_id),
                        "topic": naming::ingress_topic(&record.bot_id),
                        "lagThreshold": LAG_THRESHOLD,
                        "offsetResetPolicy": "earliest",
                    },
                },
            ],
        },
    })
}
