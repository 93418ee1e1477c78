//! Cluster-facing side of the workload adapter.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DeleteParams, PostParams, PropagationPolicy};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde_json::Value;
use tracing::{debug, info};

use botgrid_state::{naming, BotRecord};

use crate::manifests;
use crate::{WorkloadError, WorkloadResult};

/// Operations the lifecycle orchestrator needs from the cluster.
#[async_trait]
pub trait WorkloadBackend: Send + Sync {
    /// Create the bot's secret and deployment. Existing objects are
    /// tolerated.
    async fn create_bot_workload(&self, record: &BotRecord, kafka_brokers: &str)
        -> WorkloadResult<()>;

    /// Delete the bot's deployment (foreground propagation) and secret.
    /// Missing objects are tolerated.
    async fn delete_bot_workload(&self, bot_id: &str) -> WorkloadResult<()>;

    /// Ready replica count of the bot's deployment.
    async fn ready_replicas(&self, bot_id: &str) -> WorkloadResult<u32>;

    /// Create the bot's autoscaler. An existing object is tolerated.
    async fn create_scaler(&self, record: &BotRecord, kafka_brokers: &str) -> WorkloadResult<()>;

    /// Delete the bot's autoscaler. A missing object is tolerated.
    async fn delete_scaler(&self, bot_id: &str) -> WorkloadResult<()>;

    /// Read-modify-write of the autoscaler's replica bounds. Absent
    /// fields are left unchanged. Last writer wins.
    async fn update_scaler_bounds(
        &self,
        bot_id: &str,
        min_replicas: Option<u32>,
        max_replicas: Option<u32>,
    ) -> WorkloadResult<()>;

    /// Read a CA certificate (`ca.crt`) from a named secret.
    async fn read_ca_secret(&self, name: &str) -> WorkloadResult<Vec<u8>>;

    /// Liveness check against the cluster API.
    async fn ping(&self) -> WorkloadResult<()>;
}

/// Kubernetes-backed workload adapter.
pub struct KubeWorkloads {
    client: Client,
    namespace: String,
    sidecar_image: String,
}

fn already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 409)
}

fn not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

fn keda_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("keda.sh", "v1alpha1", "ScaledObject"))
}

impl KubeWorkloads {
    /// Build from the ambient cluster config (in-cluster when present,
    /// kubeconfig otherwise).
    pub async fn connect(namespace: &str, sidecar_image: &str) -> WorkloadResult<Self> {
        let client = Client::try_default().await?;
        Ok(Self {
            client,
            namespace: namespace.to_string(),
            sidecar_image: sidecar_image.to_string(),
        })
    }

    fn scalers(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &keda_resource())
    }
}

#[async_trait]
impl WorkloadBackend for KubeWorkloads {
    async fn create_bot_workload(
        &self,
        record: &BotRecord,
        kafka_brokers: &str,
    ) -> WorkloadResult<()> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let secret: Secret =
            serde_json::from_value(manifests::bot_secret(record, &self.namespace))?;
        match secrets.create(&PostParams::default(), &secret).await {
            Ok(_) => debug!(bot_id = %record.bot_id, "secret created"),
            Err(e) if already_exists(&e) => debug!(bot_id = %record.bot_id, "secret exists"),
            Err(e) => return Err(e.into()),
        }

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let deployment: Deployment = serde_json::from_value(manifests::bot_deployment(
            record,
            &self.namespace,
            &self.sidecar_image,
            kafka_brokers,
        ))?;
        match deployments.create(&PostParams::default(), &deployment).await {
            Ok(_) => debug!(bot_id = %record.bot_id, "deployment created"),
            Err(e) if already_exists(&e) => debug!(bot_id = %record.bot_id, "deployment exists"),
            Err(e) => return Err(e.into()),
        }

        info!(bot_id = %record.bot_id, workload = %naming::workload_name(&record.bot_id), "bot workload created");
        Ok(())
    }

    async fn delete_bot_workload(&self, bot_id: &str) -> WorkloadResult<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        // Foreground propagation so pods are gone before the deployment is.
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..DeleteParams::default()
        };
        match deployments.delete(&naming::workload_name(bot_id), &params).await {
            Ok(_) => debug!(%bot_id, "deployment deleted"),
            Err(e) if not_found(&e) => debug!(%bot_id, "deployment already gone"),
            Err(e) => return Err(e.into()),
        }

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        match secrets
            .delete(&naming::secret_name(bot_id), &DeleteParams::default())
            .await
        {
            Ok(_) => debug!(%bot_id, "secret deleted"),
            Err(e) if not_found(&e) => debug!(%bot_id, "secret already gone"),
            Err(e) => return Err(e.into()),
        }

        info!(%bot_id, "bot workload deleted");
        Ok(())
    }

    async fn ready_replicas(&self, bot_id: &str) -> WorkloadResult<u32> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let deployment = deployments.get(&naming::workload_name(bot_id)).await?;
        let ready = deployment
            .status
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        Ok(ready.max(0) as u32)
    }

    async fn create_scaler(&self, record: &BotRecord, kafka_brokers: &str) -> WorkloadResult<()> {
        let scaler: DynamicObject = serde_json::from_value(manifests::bot_scaler(
            record,
            &self.namespace,
            kafka_brokers,
        ))?;
        match self.scalers().create(&PostParams::default(), &scaler).await {
            Ok(_) => {}
            Err(e) if already_exists(&e) => debug!(bot_id = %record.bot_id, "scaler exists"),
            Err(e) => return Err(e.into()),
        }

        info!(bot_id = %record.bot_id, scaler = %naming::scaler_name(&record.bot_id), "scaler created");
        Ok(())
    }

    async fn delete_scaler(&self, bot_id: &str) -> WorkloadResult<()> {
        match self
            .scalers()
            .delete(&naming::scaler_name(bot_id), &DeleteParams::default())
            .await
        {
            Ok(_) => debug!(%bot_id, "scaler deleted"),
            Err(e) if not_found(&e) => debug!(%bot_id, "scaler already gone"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn update_scaler_bounds(
        &self,
        bot_id: &str,
        min_replicas: Option<u32>,
        max_replicas: Option<u32>,
    ) -> WorkloadResult<()> {
        let api = self.scalers();
        let name = naming::scaler_name(bot_id);
        let mut scaler = api.get(&name).await?;

        if let Some(spec) = scaler.data.get_mut("spec").and_then(Value::as_object_mut) {
            if let Some(min) = min_replicas {
                spec.insert("minReplicaCount".to_string(), min.into());
            }
            if let Some(max) = max_replicas {
                spec.insert("maxReplicaCount".to_string(), max.into());
            }
        }

        api.replace(&name, &PostParams::default(), &scaler).await?;
        info!(%bot_id, ?min_replicas, ?max_replicas, "scaler bounds updated");
        Ok(())
    }

    async fn read_ca_secret(&self, name: &str) -> WorkloadResult<Vec<u8>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let secret = secrets.get(name).await?;
        secret
            .data
            .and_then(|mut d| d.remove("ca.crt"))
            .map(|bytes| bytes.0)
            .ok_or_else(|| WorkloadError::MissingSecretKey {
                name: name.to_string(),
                key: "ca.crt".to_string(),
            })
    }

    async fn ping(&self) -> WorkloadResult<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.get(&self.namespace).await?;
        Ok(())
    }
}
