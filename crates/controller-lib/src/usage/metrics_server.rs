//! Usage samples from the Kubernetes metrics API (`metrics.k8s.io/v1beta1`)

use super::UsageSource;
use crate::cluster::{map_kube_error, ApiResult};
use crate::error::ApiError;
use crate::models::ResourceSample;
use crate::quantity::{parse_cpu_cores, parse_memory_mb};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Usage entry of one container in a `PodMetrics` object
#[derive(Debug, Deserialize)]
struct ContainerMetrics {
    name: String,
    #[serde(default)]
    usage: BTreeMap<String, String>,
}

/// Reads pod metrics published by metrics-server
#[derive(Clone)]
pub struct MetricsServerSource {
    client: Client,
    resource: ApiResource,
}

impl MetricsServerSource {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        Self {
            client,
            resource: ApiResource::from_gvk_with_plural(&gvk, "pods"),
        }
    }
}

/// Extract one container's sample from the body of a `PodMetrics` object
fn container_sample(
    data: &serde_json::Value,
    namespace: &str,
    pod: &str,
    container: &str,
) -> ApiResult<ResourceSample> {
    let containers: Vec<ContainerMetrics> = data
        .get("containers")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ApiError::Unavailable(format!("malformed pod metrics: {}", e)))?
        .unwrap_or_default();

    let entry = containers
        .into_iter()
        .find(|c| c.name == container)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "container {} not found in pod metrics {}/{}",
                container, namespace, pod
            ))
        })?;

    Ok(ResourceSample {
        cpu_cores: usage_quantity(&entry, "cpu", parse_cpu_cores)?,
        memory_mb: usage_quantity(&entry, "memory", parse_memory_mb)?,
    })
}

/// Parse one usage key; absent or malformed quantities are not zero usage
fn usage_quantity(
    entry: &ContainerMetrics,
    resource: &str,
    parse: fn(&str) -> Option<f64>,
) -> ApiResult<f64> {
    let raw = entry.usage.get(resource).ok_or_else(|| {
        ApiError::Unavailable(format!(
            "no {} usage reported for container {}",
            resource, entry.name
        ))
    })?;
    parse(raw).ok_or_else(|| {
        ApiError::Unavailable(format!(
            "unparseable {} quantity {:?} for container {}",
            resource, raw, entry.name
        ))
    })
}

#[async_trait]
impl UsageSource for MetricsServerSource {
    async fn container_usage(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> ApiResult<ResourceSample> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &self.resource);
        let metrics = api.get(pod).await.map_err(map_kube_error)?;
        container_sample(&metrics.data, namespace, pod, container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod_metrics() -> serde_json::Value {
        json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "window": "30s",
            "containers": [
                { "name": "app", "usage": { "cpu": "250m", "memory": "128Mi" } },
                { "name": "sidecar", "usage": { "cpu": "1500000n", "memory": "2048Ki" } }
            ]
        })
    }

    #[test]
    fn test_container_sample_parsing() {
        let sample = container_sample(&pod_metrics(), "prod", "web-1", "app").unwrap();
        assert!((sample.cpu_cores - 0.25).abs() < 1e-12);
        assert_eq!(sample.memory_mb, 128.0);

        let sidecar = container_sample(&pod_metrics(), "prod", "web-1", "sidecar").unwrap();
        assert!((sidecar.cpu_cores - 0.0015).abs() < 1e-12);
        assert_eq!(sidecar.memory_mb, 2.0);
    }

    #[test]
    fn test_missing_container_is_not_found() {
        let err = container_sample(&pod_metrics(), "prod", "web-1", "worker").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_missing_containers_field() {
        let err = container_sample(&json!({}), "prod", "web-1", "app").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_malformed_quantity_is_unavailable() {
        let data = json!({
            "containers": [{ "name": "app", "usage": { "cpu": "garbage", "memory": "12Qi" } }]
        });
        let err = container_sample(&data, "prod", "web-1", "app").unwrap_err();
        assert!(matches!(&err, ApiError::Unavailable(msg) if msg.contains("\"garbage\"")));
    }

    #[test]
    fn test_missing_quantity_is_unavailable() {
        let data = json!({
            "containers": [{ "name": "app", "usage": { "cpu": "100m" } }]
        });
        let err = container_sample(&data, "prod", "web-1", "app").unwrap_err();
        assert!(matches!(&err, ApiError::Unavailable(msg) if msg.contains("no memory usage")));
    }
}
