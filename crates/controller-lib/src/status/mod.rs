//! Status snapshots
//!
//! A snapshot lists the Deployments in scope, the pods each one selects and a
//! usage sample per container. Samples are read concurrently with a bounded
//! number of workers and a per-read timeout. A sample that fails or times out
//! becomes a zero-filled entry carrying the reason; it never fails the
//! snapshot.

mod render;

#[cfg(test)]
mod tests;

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, ResourceKind, Result};
use crate::models::{pod_phase, ContainerUsage, PodUsage, StatusSnapshot, WorkloadStatus};
use crate::observability::ControllerMetrics;
use crate::usage::UsageSource;
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Concurrency limits for usage sampling
#[derive(Debug, Clone)]
pub struct SamplingLimits {
    /// Maximum concurrent usage reads
    pub workers: usize,
    /// Timeout of a single usage read
    pub timeout: Duration,
}

impl Default for SamplingLimits {
    fn default() -> Self {
        Self {
            workers: 8,
            timeout: Duration::from_secs(2),
        }
    }
}

/// One (pod, container) usage read
#[derive(Debug, Clone)]
struct SampleJob {
    workload: usize,
    namespace: String,
    pod: String,
    container: String,
}

/// Containers reported in a pod's status
fn container_names(pod: &Pod) -> Vec<String> {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|cs| cs.name.clone()).collect())
        .unwrap_or_default()
}

/// Status text of a workload: the phase of its first listed pod
pub fn workload_status_text(pods: &[Pod]) -> String {
    pods.first()
        .map(pod_phase)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Pods selected by a Deployment's `matchLabels`
///
/// A Deployment without match labels selects nothing here rather than every
/// pod in the namespace.
async fn selected_pods(cluster: &dyn ClusterApi, deployment: &Deployment) -> Result<Vec<Pod>> {
    let namespace = deployment.metadata.namespace.as_deref().unwrap_or("default");
    let selector = deployment
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.as_ref())
        .filter(|labels| !labels.is_empty());

    let Some(selector) = selector else {
        debug!(
            workload = deployment.metadata.name.as_deref().unwrap_or_default(),
            namespace, "Deployment has no match labels"
        );
        return Ok(Vec::new());
    };

    cluster
        .list_pods(Some(namespace), Some(selector))
        .await
        .map_err(|e| ControllerError::from_list(e, ResourceKind::Pod, Some(namespace)))
}

/// Read every job's sample with at most `limits.workers` reads in flight
///
/// Dropping the returned future aborts all outstanding reads.
async fn sample_all(
    usage: Arc<dyn UsageSource>,
    jobs: Vec<SampleJob>,
    limits: &SamplingLimits,
) -> Vec<(SampleJob, ContainerUsage)> {
    let semaphore = Arc::new(Semaphore::new(limits.workers.max(1)));
    let mut tasks = JoinSet::new();

    for job in jobs {
        let usage = Arc::clone(&usage);
        let semaphore = Arc::clone(&semaphore);
        let timeout = limits.timeout;

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (job, ContainerUsage::unavailable("sampler shut down"));
            };

            let read = usage.container_usage(&job.namespace, &job.pod, &job.container);
            let entry = match tokio::time::timeout(timeout, read).await {
                Ok(Ok(sample)) => ContainerUsage::sampled(sample),
                Ok(Err(e)) => ContainerUsage::unavailable(e.to_string()),
                Err(_) => ContainerUsage::unavailable(format!(
                    "metrics read timed out after {}ms",
                    timeout.as_millis()
                )),
            };
            (job, entry)
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!(error = %e, "Usage sampling task failed"),
        }
    }
    results
}

/// Build a snapshot of every Deployment in `namespace`, or in all namespaces
pub async fn status_snapshot(
    cluster: &dyn ClusterApi,
    usage: Arc<dyn UsageSource>,
    namespace: Option<&str>,
    limits: &SamplingLimits,
) -> Result<StatusSnapshot> {
    let deployments = cluster
        .list_deployments(namespace)
        .await
        .map_err(|e| ControllerError::from_list(e, ResourceKind::Workload, namespace))?;

    let mut workloads = Vec::with_capacity(deployments.len());
    let mut jobs = Vec::new();

    for (index, deployment) in deployments.iter().enumerate() {
        let pods = selected_pods(cluster, deployment).await?;
        let ns = deployment
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());

        let mut pod_entries = BTreeMap::new();
        for pod in &pods {
            let pod_name = pod.metadata.name.clone().unwrap_or_default();
            let mut containers = BTreeMap::new();
            for container in container_names(pod) {
                // Placeholder until the read completes; a panicked read keeps it
                containers.insert(
                    container.clone(),
                    ContainerUsage::unavailable("usage read did not complete"),
                );
                jobs.push(SampleJob {
                    workload: index,
                    namespace: ns.clone(),
                    pod: pod_name.clone(),
                    container,
                });
            }
            pod_entries.insert(pod_name, (pod_phase(pod), containers));
        }

        workloads.push((
            WorkloadStatus {
                namespace: ns,
                name: deployment.metadata.name.clone().unwrap_or_default(),
                status: workload_status_text(&pods),
                replicas: deployment
                    .spec
                    .as_ref()
                    .and_then(|s| s.replicas)
                    .unwrap_or(1),
                pods: BTreeMap::new(),
            },
            pod_entries,
        ));
    }

    let metrics = ControllerMetrics::new();
    for (job, entry) in sample_all(usage, jobs, limits).await {
        if let Some(reason) = entry.unavailable.as_deref() {
            metrics.inc_sample_failures();
            warn!(
                namespace = %job.namespace,
                pod = %job.pod,
                container = %job.container,
                reason,
                "Container usage unavailable"
            );
        }
        if let Some((_, pods)) = workloads.get_mut(job.workload) {
            if let Some((_, containers)) = pods.get_mut(&job.pod) {
                containers.insert(job.container, entry);
            }
        }
    }

    let workloads: Vec<WorkloadStatus> = workloads
        .into_iter()
        .map(|(mut status, pods)| {
            status.pods = pods
                .into_iter()
                .map(|(name, (phase, containers))| (name, PodUsage::new(phase, containers)))
                .collect();
            status
        })
        .collect();

    metrics.set_workloads_in_snapshot(workloads.len());

    Ok(StatusSnapshot {
        generated_at: Utc::now().timestamp(),
        workloads,
    })
}
