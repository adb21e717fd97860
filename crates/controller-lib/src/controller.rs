//! The controller surface used by the HTTP service and other front-ends
//!
//! Every operation is a single request/response cycle against the cluster.
//! Operations are plain futures: dropping one cancels the remote calls it
//! has in flight.

use crate::cluster::ClusterApi;
use crate::error::{ApiError, ControllerError, ResourceKind, Result};
use crate::health::{components, HealthRegistry};
use crate::models::StatusSnapshot;
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::retry::RetryPolicy;
use crate::scaling::DEFAULT_MAX_REPLICAS;
use crate::status::SamplingLimits;
use crate::usage::UsageSource;
use crate::{restart, revisions, rollback, scaling, status, topology};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables of the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Retry budget for conflicting Deployment writes
    pub retry: RetryPolicy,
    /// Largest accepted replica target
    pub max_replicas: i32,
    /// Usage sampling limits for status snapshots
    pub sampling: SamplingLimits,
    /// Deadline for a whole operation, retries and sampling included
    pub operation_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_replicas: DEFAULT_MAX_REPLICAS,
            sampling: SamplingLimits::default(),
            operation_timeout: Duration::from_secs(60),
        }
    }
}

/// Deployment lifecycle controller
#[derive(Clone)]
pub struct Controller {
    cluster: Arc<dyn ClusterApi>,
    usage: Arc<dyn UsageSource>,
    config: ControllerConfig,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl Controller {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        usage: Arc<dyn UsageSource>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            cluster,
            usage,
            config,
            metrics: ControllerMetrics::new(),
            logger: StructuredLogger::new("workload-controller"),
            health: HealthRegistry::new(),
        }
    }

    /// Report collaborator health into `health` instead of a private registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Run an operation under the configured deadline, count its outcome and
    /// track cluster health
    ///
    /// An operation that overruns is dropped, which cancels its remote calls.
    async fn instrument<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let deadline = self.config.operation_timeout;
        let result = match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(ControllerError::RemoteUnavailable {
                context: format!("complete {}", operation),
                source: ApiError::Unavailable(format!(
                    "operation timed out after {}ms",
                    deadline.as_millis()
                )),
            }),
        };
        self.metrics
            .observe_operation(operation, result.is_ok(), start.elapsed().as_secs_f64());

        match &result {
            Err(err @ ControllerError::RemoteUnavailable { .. }) => {
                self.health
                    .set_degraded(components::CLUSTER_API, err.to_string())
                    .await;
            }
            _ => self.health.set_healthy(components::CLUSTER_API).await,
        }
        result
    }

    /// Deployments in `namespace`, or in all namespaces
    pub async fn list_workloads(&self, namespace: Option<&str>) -> Result<Vec<Deployment>> {
        self.instrument("list_workloads", async {
            self.cluster
                .list_deployments(namespace)
                .await
                .map_err(|e| ControllerError::from_list(e, ResourceKind::Workload, namespace))
        })
        .await
    }

    /// Pods in `namespace`, or in all namespaces
    pub async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        self.instrument("list_pods", async {
            self.cluster
                .list_pods(namespace, None)
                .await
                .map_err(|e| ControllerError::from_list(e, ResourceKind::Pod, namespace))
        })
        .await
    }

    pub async fn get_pod(&self, namespace: &str, pod: &str) -> Result<Pod> {
        self.instrument("get_pod", async {
            self.cluster
                .get_pod(namespace, pod)
                .await
                .map_err(|e| ControllerError::from_api(e, "get", ResourceKind::Pod, namespace, pod))
        })
        .await
    }

    /// Name of the Deployment that owns `pod`
    pub async fn resolve_owning_workload(&self, pod: &Pod) -> Result<String> {
        self.instrument(
            "resolve_owning_workload",
            topology::resolve_owning_workload(self.cluster.as_ref(), pod),
        )
        .await
    }

    /// Revision ids of a Deployment, newest first
    pub async fn list_revisions(&self, workload: &str, namespace: &str) -> Result<Vec<String>> {
        self.instrument(
            "list_revisions",
            revisions::list_revisions(self.cluster.as_ref(), workload, namespace),
        )
        .await
    }

    pub async fn set_revision(
        &self,
        workload: &str,
        namespace: &str,
        revision: &str,
    ) -> Result<()> {
        let result = self
            .instrument(
                "set_revision",
                rollback::set_revision(
                    self.cluster.as_ref(),
                    &self.config.retry,
                    workload,
                    namespace,
                    revision,
                ),
            )
            .await;

        let error = result.as_ref().err().map(ToString::to_string);
        self.logger
            .log_rollback(namespace, workload, revision, error.as_deref());
        result
    }

    pub async fn scale(&self, workload: &str, namespace: &str, target: i32) -> Result<()> {
        let result = self
            .instrument(
                "scale",
                scaling::scale(
                    self.cluster.as_ref(),
                    &self.config.retry,
                    self.config.max_replicas,
                    workload,
                    namespace,
                    target,
                ),
            )
            .await;

        let error = result.as_ref().err().map(ToString::to_string);
        self.logger
            .log_scale(namespace, workload, target, error.as_deref());
        result
    }

    /// Trigger a rolling restart; returns the `restartedAt` stamp
    pub async fn restart_workload(&self, workload: &str, namespace: &str) -> Result<String> {
        let result = self
            .instrument(
                "restart_workload",
                restart::restart_workload(
                    self.cluster.as_ref(),
                    &self.config.retry,
                    workload,
                    namespace,
                ),
            )
            .await;

        let error = result.as_ref().err().map(ToString::to_string);
        self.logger
            .log_workload_restart(namespace, workload, error.as_deref());
        result
    }

    pub async fn restart_pod(&self, namespace: &str, pod: &str) -> Result<()> {
        let result = self
            .instrument(
                "restart_pod",
                restart::restart_pod(self.cluster.as_ref(), namespace, pod),
            )
            .await;

        let error = result.as_ref().err().map(ToString::to_string);
        self.logger.log_pod_restart(namespace, pod, error.as_deref());
        result
    }

    pub async fn status_snapshot(&self, namespace: Option<&str>) -> Result<StatusSnapshot> {
        let snapshot = self
            .instrument(
                "status_snapshot",
                status::status_snapshot(
                    self.cluster.as_ref(),
                    Arc::clone(&self.usage),
                    namespace,
                    &self.config.sampling,
                ),
            )
            .await?;

        let unavailable = snapshot.unavailable_samples();
        if unavailable > 0 {
            self.logger
                .log_partial_snapshot(namespace, snapshot.workloads.len(), unavailable);
            self.health
                .set_degraded(
                    components::METRICS_API,
                    format!("{} container samples unavailable", unavailable),
                )
                .await;
        } else {
            self.health.set_healthy(components::METRICS_API).await;
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::fixtures;
    use crate::health::ComponentStatus;
    use crate::models::ResourceSample;
    use crate::usage::StaticUsageSource;

    fn controller() -> (Arc<InMemoryCluster>, Arc<StaticUsageSource>, Controller) {
        let cluster = Arc::new(InMemoryCluster::new());
        let usage = Arc::new(StaticUsageSource::new());
        let config = ControllerConfig {
            retry: RetryPolicy::immediate(3),
            ..Default::default()
        };
        let controller = Controller::new(cluster.clone(), usage.clone(), config);
        (cluster, usage, controller)
    }

    #[tokio::test]
    async fn test_pod_to_rollback_flow() {
        let (cluster, _, controller) = controller();
        cluster.insert_deployment(fixtures::deployment("prod", "web", 3, "nginx:1.27"));
        cluster.insert_replica_set(fixtures::replica_set("prod", "web", "1", "nginx:1.25"));
        cluster.insert_replica_set(fixtures::replica_set("prod", "web", "2", "nginx:1.27"));
        cluster.insert_pod(fixtures::pod("prod", "web-a", "web", Some("web-rev2"), &["web"]));

        let pod = controller.get_pod("prod", "web-a").await.unwrap();
        let workload = controller.resolve_owning_workload(&pod).await.unwrap();
        assert_eq!(workload, "web");

        let revisions = controller.list_revisions(&workload, "prod").await.unwrap();
        assert_eq!(revisions, vec!["2".to_string(), "1".to_string()]);

        controller.set_revision(&workload, "prod", "1").await.unwrap();
        controller.scale(&workload, "prod", 5).await.unwrap();

        let deployment = cluster.deployment("prod", "web").unwrap();
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(5));
        assert_eq!(
            spec.template.spec.unwrap().containers[0].image.as_deref(),
            Some("nginx:1.25")
        );
    }

    #[tokio::test]
    async fn test_operations_are_counted() {
        let (_, _, controller) = controller();
        let before = ControllerMetrics::new().operations("scale", false);

        let err = controller.scale("web", "prod", -4).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidScale { .. }));
        assert!(ControllerMetrics::new().operations("scale", false) > before);
    }

    #[tokio::test]
    async fn test_unreachable_cluster_degrades_health() {
        let (cluster, _, controller) = controller();
        cluster.set_unavailable(true);

        let err = controller.list_workloads(None).await.unwrap_err();
        assert!(matches!(err, ControllerError::RemoteUnavailable { .. }));
        let health = controller.health().health().await;
        assert_eq!(
            health.components[components::CLUSTER_API].status,
            ComponentStatus::Degraded
        );

        cluster.set_unavailable(false);
        controller.list_workloads(None).await.unwrap();
        let health = controller.health().health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_partial_snapshot_degrades_metrics_health() {
        let (cluster, usage, controller) = controller();
        cluster.insert_deployment(fixtures::deployment("prod", "web", 1, "nginx"));
        cluster.insert_pod(fixtures::pod(
            "prod",
            "web-a",
            "web",
            Some("web-rev1"),
            &["app", "sidecar"],
        ));
        usage.set_sample(
            "prod",
            "web-a",
            "app",
            ResourceSample {
                cpu_cores: 0.1,
                memory_mb: 64.0,
            },
        );

        let snapshot = controller.status_snapshot(Some("prod")).await.unwrap();
        assert_eq!(snapshot.unavailable_samples(), 1);

        let health = controller.health().health().await;
        assert_eq!(
            health.components[components::METRICS_API].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_deadline() {
        let cluster = Arc::new(InMemoryCluster::new());
        let usage = Arc::new(StaticUsageSource::new());
        cluster.insert_deployment(fixtures::deployment("prod", "web", 1, "nginx"));
        cluster.insert_pod(fixtures::pod("prod", "web-a", "web", Some("web-rev1"), &["app"]));
        usage.stall("prod", "web-a", "app");

        let config = ControllerConfig {
            operation_timeout: Duration::from_millis(500),
            sampling: SamplingLimits {
                workers: 2,
                timeout: Duration::from_secs(5),
            },
            ..Default::default()
        };
        let controller = Controller::new(cluster.clone(), usage.clone(), config);

        let err = controller.status_snapshot(Some("prod")).await.unwrap_err();
        assert!(matches!(err, ControllerError::RemoteUnavailable { .. }));
        assert!(err.to_string().contains("timed out after 500ms"));

        let health = controller.health().health().await;
        assert_eq!(
            health.components[components::CLUSTER_API].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_restart_pod_through_controller() {
        let (cluster, _, controller) = controller();
        cluster.insert_pod(fixtures::pod("ns", "p1", "web", Some("web-rev1"), &["web"]));

        controller.restart_pod("ns", "p1").await.unwrap();
        assert_eq!(cluster.deleted_pods(), vec![("ns".to_string(), "p1".to_string())]);
    }
}
