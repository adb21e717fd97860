//! Observability for the workload controller
//!
//! Provides:
//! - Prometheus metrics (operation outcomes and latency, conflict retries, sample failures)
//! - Structured audit logging of mutating operations with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for operation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    operations_total: IntCounterVec,
    operation_latency_seconds: HistogramVec,
    conflict_retries_total: IntCounter,
    sample_failures_total: IntCounter,
    workloads_in_snapshot: IntGauge,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            operations_total: register_int_counter_vec!(
                "workload_controller_operations_total",
                "Controller operations by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register operations_total"),

            operation_latency_seconds: register_histogram_vec!(
                "workload_controller_operation_latency_seconds",
                "Time spent serving controller operations",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register operation_latency_seconds"),

            conflict_retries_total: register_int_counter!(
                "workload_controller_conflict_retries_total",
                "Deployment writes rejected because of a stale resource version"
            )
            .expect("Failed to register conflict_retries_total"),

            sample_failures_total: register_int_counter!(
                "workload_controller_metric_sample_failures_total",
                "Container usage reads that failed or timed out"
            )
            .expect("Failed to register metric_sample_failures_total"),

            workloads_in_snapshot: register_int_gauge!(
                "workload_controller_workloads_in_snapshot",
                "Number of deployments in the last status snapshot"
            )
            .expect("Failed to register workloads_in_snapshot"),
        }
    }
}

/// Handle to the process-wide controller metrics
///
/// Every handle shares the same registered collectors.
#[derive(Clone)]
pub struct ControllerMetrics {
    _private: (),
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControllerMetricsInner {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new)
    }

    /// Record the outcome and latency of one operation
    pub fn observe_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "error" };
        self.inner()
            .operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.inner()
            .operation_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn inc_conflict_retries(&self) {
        self.inner().conflict_retries_total.inc();
    }

    pub fn inc_sample_failures(&self) {
        self.inner().sample_failures_total.inc();
    }

    pub fn set_workloads_in_snapshot(&self, count: usize) {
        self.inner()
            .workloads_in_snapshot
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Current value of the conflict retry counter
    pub fn conflict_retries(&self) -> u64 {
        self.inner().conflict_retries_total.get()
    }

    /// Current value of the operation counter for one operation and outcome
    pub fn operations(&self, operation: &str, success: bool) -> u64 {
        let outcome = if success { "success" } else { "error" };
        self.inner()
            .operations_total
            .with_label_values(&[operation, outcome])
            .get()
    }
}

/// Audit logger for controller mutations
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, default_namespace: &str) {
        info!(
            event = "controller_started",
            instance = %self.instance,
            controller_version = %version,
            default_namespace = %default_namespace,
            "Workload controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Workload controller shutting down"
        );
    }

    /// Log a rollback attempt and its outcome
    pub fn log_rollback(
        &self,
        namespace: &str,
        workload: &str,
        revision: &str,
        error: Option<&str>,
    ) {
        match error {
            None => info!(
                event = "workload_rolled_back",
                instance = %self.instance,
                namespace = %namespace,
                workload = %workload,
                revision = %revision,
                "Deployment rolled back"
            ),
            Some(error) => warn!(
                event = "workload_rollback_failed",
                instance = %self.instance,
                namespace = %namespace,
                workload = %workload,
                revision = %revision,
                error = %error,
                "Deployment rollback failed"
            ),
        }
    }

    pub fn log_scale(&self, namespace: &str, workload: &str, replicas: i32, error: Option<&str>) {
        match error {
            None => info!(
                event = "workload_scaled",
                instance = %self.instance,
                namespace = %namespace,
                workload = %workload,
                replicas = replicas,
                "Deployment scaled"
            ),
            Some(error) => warn!(
                event = "workload_scale_failed",
                instance = %self.instance,
                namespace = %namespace,
                workload = %workload,
                replicas = replicas,
                error = %error,
                "Deployment scale failed"
            ),
        }
    }

    pub fn log_workload_restart(&self, namespace: &str, workload: &str, error: Option<&str>) {
        match error {
            None => info!(
                event = "workload_restarted",
                instance = %self.instance,
                namespace = %namespace,
                workload = %workload,
                "Deployment restart requested"
            ),
            Some(error) => warn!(
                event = "workload_restart_failed",
                instance = %self.instance,
                namespace = %namespace,
                workload = %workload,
                error = %error,
                "Deployment restart failed"
            ),
        }
    }

    pub fn log_pod_restart(&self, namespace: &str, pod: &str, error: Option<&str>) {
        match error {
            None => info!(
                event = "pod_deleted",
                instance = %self.instance,
                namespace = %namespace,
                pod = %pod,
                "Pod deleted for restart"
            ),
            Some(error) => warn!(
                event = "pod_delete_failed",
                instance = %self.instance,
                namespace = %namespace,
                pod = %pod,
                error = %error,
                "Pod delete failed"
            ),
        }
    }

    /// Log a snapshot that had to zero-fill some containers
    pub fn log_partial_snapshot(
        &self,
        namespace: Option<&str>,
        workloads: usize,
        unavailable: usize,
    ) {
        warn!(
            event = "status_snapshot_partial",
            instance = %self.instance,
            namespace = namespace.unwrap_or("*"),
            workloads = workloads,
            unavailable_samples = unavailable,
            "Status snapshot built with unavailable container samples"
        );
    }
}
