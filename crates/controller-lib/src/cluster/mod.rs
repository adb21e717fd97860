//! Cluster API collaborator
//!
//! The controller reads and writes Deployments, ReplicaSets and Pods through
//! the [`ClusterApi`] trait. Updates carry the `resourceVersion` of the object
//! they were derived from; the store rejects stale versions with
//! [`ApiError::Conflict`].

mod kubernetes;
mod memory;

pub use kubernetes::KubeCluster;
pub(crate) use kubernetes::map_kube_error;
pub use memory::InMemoryCluster;

use crate::error::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Result type for collaborator calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Trait for cluster API implementations
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a deployment
    async fn get_deployment(&self, namespace: &str, name: &str) -> ApiResult<Deployment>;

    /// List deployments, across all namespaces when `namespace` is `None`
    async fn list_deployments(&self, namespace: Option<&str>) -> ApiResult<Vec<Deployment>>;

    /// Replace a deployment; fails with `Conflict` if its resource version is stale
    async fn update_deployment(&self, deployment: &Deployment) -> ApiResult<Deployment>;

    /// Fetch a ReplicaSet
    async fn get_replica_set(&self, namespace: &str, name: &str) -> ApiResult<ReplicaSet>;

    /// List all ReplicaSets in a namespace
    async fn list_replica_sets(&self, namespace: &str) -> ApiResult<Vec<ReplicaSet>>;

    /// Fetch a pod
    async fn get_pod(&self, namespace: &str, name: &str) -> ApiResult<Pod>;

    /// List pods, optionally restricted by namespace and label equality selector
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&BTreeMap<String, String>>,
    ) -> ApiResult<Vec<Pod>>;

    /// Delete a pod
    async fn delete_pod(&self, namespace: &str, name: &str) -> ApiResult<()>;
}

/// Render a `matchLabels` map as a label selector string (`k1=v1,k2=v2`)
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_rendering() {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        labels.insert("tier".to_string(), "frontend".to_string());
        assert_eq!(label_selector(&labels), "app=web,tier=frontend");
    }

    #[test]
    fn test_empty_label_selector() {
        assert_eq!(label_selector(&BTreeMap::new()), "");
    }
}
