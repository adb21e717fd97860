//! Service configuration

use anyhow::{Context, Result};
use controller_lib::{ControllerConfig, RetryPolicy, SamplingLimits};
use serde::Deserialize;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Service configuration, read from `CONTROLLER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name reported in audit logs, the pod name when run in-cluster
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// HTTP port for the API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Timeout for a single Kubernetes API request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for one controller operation, retries included
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Largest accepted replica target
    #[serde(default = "default_max_replicas")]
    pub max_replicas: i32,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff")]
    pub retry_max_backoff_ms: u64,

    /// Concurrent container usage reads per status snapshot
    #[serde(default = "default_metrics_concurrency")]
    pub metrics_concurrency: usize,

    /// Timeout for one container usage read
    #[serde(default = "default_metrics_timeout")]
    pub metrics_timeout_ms: u64,
}

fn default_instance_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "workload-controller".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    60
}

fn default_max_replicas() -> i32 {
    1000
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_initial_backoff() -> u64 {
    10
}

fn default_retry_max_backoff() -> u64 {
    1000
}

fn default_metrics_concurrency() -> usize {
    8
}

fn default_metrics_timeout() -> u64 {
    2000
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("CONTROLLER").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid CONTROLLER_* configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Controller tunables derived from this configuration
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
            },
            max_replicas: self.max_replicas,
            sampling: SamplingLimits {
                workers: self.metrics_concurrency,
                timeout: Duration::from_millis(self.metrics_timeout_ms),
            },
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
        }
    }
}
