//! Kubernetes API server implementation of [`ClusterApi`]

use super::{label_selector, ApiResult, ClusterApi};
use crate::error::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Config};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Cluster access through kube-rs
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster configuration or the local kubeconfig
    pub async fn connect(request_timeout: Duration) -> ApiResult<Self> {
        let mut config = Config::infer()
            .await
            .map_err(|e| ApiError::Unavailable(format!("failed to infer kube config: {}", e)))?;
        config.read_timeout = Some(request_timeout);

        info!(cluster_url = %config.cluster_url, "Connecting to Kubernetes API");

        let client = Client::try_from(config)
            .map_err(|e| ApiError::Unavailable(format!("failed to create client: {}", e)))?;
        Ok(Self::new(client))
    }

    /// Underlying client, shared with the metrics source
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn deployments(&self, namespace: Option<&str>) -> Api<Deployment> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Map kube-rs errors onto the collaborator error taxonomy
pub(crate) fn map_kube_error(err: kube::Error) -> ApiError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ApiError::NotFound(response.message),
        kube::Error::Api(response) if response.code == 409 => ApiError::Conflict(response.message),
        other => ApiError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get_deployment(&self, namespace: &str, name: &str) -> ApiResult<Deployment> {
        self.deployments(Some(namespace))
            .get(name)
            .await
            .map_err(map_kube_error)
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> ApiResult<Vec<Deployment>> {
        let list = self
            .deployments(namespace)
            .list(&ListParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(list.items)
    }

    async fn update_deployment(&self, deployment: &Deployment) -> ApiResult<Deployment> {
        let name = deployment
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ApiError::Unavailable("deployment has no name".to_string()))?;
        let namespace = deployment.metadata.namespace.as_deref();

        debug!(
            deployment = %name,
            resource_version = ?deployment.metadata.resource_version,
            "Replacing deployment"
        );

        self.deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
            .map_err(map_kube_error)
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> ApiResult<ReplicaSet> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(map_kube_error)
    }

    async fn list_replica_sets(&self, namespace: &str) -> ApiResult<Vec<ReplicaSet>> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(list.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> ApiResult<Pod> {
        self.pods(Some(namespace))
            .get(name)
            .await
            .map_err(map_kube_error)
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&BTreeMap<String, String>>,
    ) -> ApiResult<Vec<Pod>> {
        let mut params = ListParams::default();
        if let Some(labels) = selector.filter(|l| !l.is_empty()) {
            params = params.labels(&label_selector(labels));
        }

        let list = self
            .pods(namespace)
            .list(&params)
            .await
            .map_err(map_kube_error)?;
        Ok(list.items)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> ApiResult<()> {
        self.pods(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }
}
