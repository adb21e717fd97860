//! Workload and pod restarts

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, ResourceKind, Result};
use crate::retry::{update_workload, RetryPolicy};
use chrono::{SecondsFormat, Utc};
use tracing::info;

/// Template annotation that triggers a rolling restart when changed
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Stamp the restart annotation on a Deployment's pod template
///
/// The Deployment controller rolls every pod because the template changed.
/// Returns the timestamp that was written.
pub async fn restart_workload(
    cluster: &dyn ClusterApi,
    policy: &RetryPolicy,
    workload: &str,
    namespace: &str,
) -> Result<String> {
    let restarted_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    update_workload(cluster, policy, namespace, workload, |deployment| {
        deployment
            .spec
            .get_or_insert_with(Default::default)
            .template
            .metadata
            .get_or_insert_with(Default::default)
            .annotations
            .get_or_insert_with(Default::default)
            .insert(RESTARTED_AT_ANNOTATION.to_string(), restarted_at.clone());
    })
    .await?;

    info!(workload, namespace, restarted_at = %restarted_at, "Restarted deployment");
    Ok(restarted_at)
}

/// Delete a pod and leave its replacement to the owning controller
pub async fn restart_pod(cluster: &dyn ClusterApi, namespace: &str, pod: &str) -> Result<()> {
    cluster
        .delete_pod(namespace, pod)
        .await
        .map_err(|e| ControllerError::from_api(e, "delete", ResourceKind::Pod, namespace, pod))?;

    info!(pod, namespace, "Deleted pod");
    Ok(())
}
