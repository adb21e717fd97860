//! Replica count updates

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, Result};
use crate::retry::{update_workload, RetryPolicy};
use tracing::info;

/// Default upper bound for a replica target
pub const DEFAULT_MAX_REPLICAS: i32 = 1000;

/// Check that `target` lies in `0..=max`
pub fn validate_target(workload: &str, namespace: &str, target: i32, max: i32) -> Result<()> {
    if (0..=max).contains(&target) {
        Ok(())
    } else {
        Err(ControllerError::InvalidScale {
            workload: workload.to_string(),
            namespace: namespace.to_string(),
            target,
            max,
        })
    }
}

/// Set the desired replica count of a Deployment to an absolute `target`
///
/// Returns once the count is recorded; pods converge afterwards.
pub async fn scale(
    cluster: &dyn ClusterApi,
    policy: &RetryPolicy,
    max_replicas: i32,
    workload: &str,
    namespace: &str,
    target: i32,
) -> Result<()> {
    validate_target(workload, namespace, target, max_replicas)?;

    update_workload(cluster, policy, namespace, workload, |deployment| {
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(target);
    })
    .await?;

    info!(workload, namespace, replicas = target, "Scaled deployment");
    Ok(())
}
