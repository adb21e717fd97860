//! Deployment lifecycle controller library
//!
//! This crate provides the core functionality for:
//! - Resolving pods to their owning deployments
//! - Indexing and rolling back to deployment revisions
//! - Scaling and restarting workloads under optimistic concurrency
//! - Aggregating per-container resource usage into a status tree
//! - Health checks and observability

pub mod cluster;
pub mod controller;
pub mod error;
pub mod fixtures;
pub mod health;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod restart;
pub mod retry;
pub mod revisions;
pub mod rollback;
pub mod scaling;
pub mod status;
pub mod topology;
pub mod usage;

pub use cluster::{ClusterApi, InMemoryCluster, KubeCluster};
pub use controller::{Controller, ControllerConfig};
pub use error::{ApiError, ControllerError, ResourceKind, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
pub use retry::RetryPolicy;
pub use status::SamplingLimits;
pub use usage::{MetricsServerSource, StaticUsageSource, UsageSource};
