//! Core data models for the workload controller

use crate::revisions::REVISION_ANNOTATION;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing entry for a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub images: Vec<String>,
}

impl From<&Deployment> for WorkloadSummary {
    fn from(deployment: &Deployment) -> Self {
        let spec = deployment.spec.as_ref();
        Self {
            namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
            name: deployment.metadata.name.clone().unwrap_or_default(),
            // The API server defaults an unset replica count to 1
            replicas: spec.and_then(|s| s.replicas).unwrap_or(1),
            ready_replicas: deployment
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0),
            revision: deployment
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(REVISION_ANNOTATION))
                .cloned(),
            images: spec
                .and_then(|s| s.template.spec.as_ref())
                .map(|pod_spec| {
                    pod_spec
                        .containers
                        .iter()
                        .filter_map(|c| c.image.clone())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Listing entry for a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSummary {
    pub namespace: String,
    pub name: String,
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub restarts: i32,
    /// Name of the owning ReplicaSet, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_record: Option<String>,
}

impl From<&Pod> for PodSummary {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        Self {
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase: pod_phase(pod),
            node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            restarts: status
                .and_then(|s| s.container_statuses.as_ref())
                .map(|statuses| statuses.iter().map(|cs| cs.restart_count).sum())
                .unwrap_or(0),
            revision_record: pod
                .metadata
                .owner_references
                .as_ref()
                .and_then(|refs| refs.iter().find(|r| r.kind == "ReplicaSet"))
                .map(|r| r.name.clone()),
        }
    }
}

/// Phase of a pod, `Unknown` when the status has not been reported yet
pub fn pod_phase(pod: &Pod) -> String {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Point-in-time resource usage of one container
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_cores: f64,
    pub memory_mb: f64,
}

/// Container entry of a status snapshot
///
/// When the sample could not be read the usage is zero-filled and
/// `unavailable` carries the reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub cpu_cores: f64,
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

impl ContainerUsage {
    pub fn sampled(sample: ResourceSample) -> Self {
        Self {
            cpu_cores: sample.cpu_cores,
            memory_mb: sample.memory_mb,
            unavailable: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            cpu_cores: 0.0,
            memory_mb: 0.0,
            unavailable: Some(reason.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }
}

/// Pod entry of a status snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodUsage {
    pub phase: String,
    pub containers: BTreeMap<String, ContainerUsage>,
    pub total_cpu_cores: f64,
    pub total_memory_mb: f64,
}

impl PodUsage {
    /// Build a pod entry, summing container usage into the pod totals
    pub fn new(phase: impl Into<String>, containers: BTreeMap<String, ContainerUsage>) -> Self {
        let total_cpu_cores = containers.values().map(|c| c.cpu_cores).sum();
        let total_memory_mb = containers.values().map(|c| c.memory_mb).sum();
        Self {
            phase: phase.into(),
            containers,
            total_cpu_cores,
            total_memory_mb,
        }
    }
}

/// Workload entry of a status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadStatus {
    pub namespace: String,
    pub name: String,
    /// Phase of the first listed pod, `Unknown` without pods
    pub status: String,
    pub replicas: i32,
    pub pods: BTreeMap<String, PodUsage>,
}

/// Point-in-time Workload -> Pod -> Container usage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub generated_at: i64,
    pub workloads: Vec<WorkloadStatus>,
}

impl StatusSnapshot {
    /// Number of container entries whose sample could not be read
    pub fn unavailable_samples(&self) -> usize {
        self.workloads
            .iter()
            .flat_map(|w| w.pods.values())
            .flat_map(|p| p.containers.values())
            .filter(|c| !c.is_available())
            .count()
    }

    /// Look up a workload entry by namespace and name
    pub fn workload(&self, namespace: &str, name: &str) -> Option<&WorkloadStatus> {
        self.workloads
            .iter()
            .find(|w| w.namespace == namespace && w.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::{
        Container, ContainerStatus, PodSpec, PodStatus, PodTemplateSpec,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    #[test]
    fn test_workload_summary_from_deployment() {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some("web".into()),
                namespace: Some("prod".into()),
                annotations: Some([(REVISION_ANNOTATION.to_string(), "7".to_string())].into()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "app".into(),
                            image: Some("nginx:1.25".into()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: Some(2),
                ..Default::default()
            }),
        };

        let summary = WorkloadSummary::from(&deployment);
        assert_eq!(summary.name, "web");
        assert_eq!(summary.replicas, 3);
        assert_eq!(summary.ready_replicas, 2);
        assert_eq!(summary.revision.as_deref(), Some("7"));
        assert_eq!(summary.images, vec!["nginx:1.25".to_string()]);
    }

    #[test]
    fn test_pod_summary_from_pod() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-abc".into()),
                namespace: Some("prod".into()),
                owner_references: Some(vec![OwnerReference {
                    kind: "ReplicaSet".into(),
                    name: "web-7d4b9".into(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some("node-1".into()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".into()),
                container_statuses: Some(vec![
                    ContainerStatus {
                        name: "app".into(),
                        restart_count: 2,
                        ..Default::default()
                    },
                    ContainerStatus {
                        name: "sidecar".into(),
                        restart_count: 1,
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        };

        let summary = PodSummary::from(&pod);
        assert_eq!(summary.phase, "Running");
        assert_eq!(summary.restarts, 3);
        assert_eq!(summary.node.as_deref(), Some("node-1"));
        assert_eq!(summary.revision_record.as_deref(), Some("web-7d4b9"));
    }

    #[test]
    fn test_pod_usage_totals() {
        let mut containers = BTreeMap::new();
        containers.insert(
            "app".to_string(),
            ContainerUsage::sampled(ResourceSample {
                cpu_cores: 0.25,
                memory_mb: 128.0,
            }),
        );
        containers.insert("sidecar".to_string(), ContainerUsage::unavailable("timeout"));

        let pod = PodUsage::new("Running", containers);
        assert_eq!(pod.total_cpu_cores, 0.25);
        assert_eq!(pod.total_memory_mb, 128.0);
    }
}
