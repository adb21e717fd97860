//! Container resource usage sources
//!
//! The status aggregator reads point-in-time usage for one
//! (namespace, pod, container) at a time through [`UsageSource`].

mod metrics_server;
mod static_source;

pub use metrics_server::MetricsServerSource;
pub use static_source::StaticUsageSource;

use crate::cluster::ApiResult;
use crate::models::ResourceSample;
use async_trait::async_trait;

/// Trait for usage sample implementations
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Read the current usage of one container
    async fn container_usage(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> ApiResult<ResourceSample>;
}
