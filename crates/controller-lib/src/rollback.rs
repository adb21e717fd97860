//! Rollback of a Deployment to a historical revision
//!
//! Only `spec.template` is replaced. The replica count and every other field
//! are taken from the Deployment as read on each attempt, so a rollback that
//! races with a scale keeps the new replica count.

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, Result};
use crate::retry::{update_workload, RetryPolicy};
use crate::revisions::{owned_records, revision_of};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use tracing::info;

/// Annotation recording why the current template was applied
pub const CHANGE_CAUSE_ANNOTATION: &str = "kubernetes.io/change-cause";

/// Label the ReplicaSet controller adds to every template it owns
pub const POD_TEMPLATE_HASH_LABEL: &str = "pod-template-hash";

/// Apply a historical template to a Deployment
pub fn apply_template(deployment: &mut Deployment, template: PodTemplateSpec, revision: &str) {
    deployment
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(
            CHANGE_CAUSE_ANNOTATION.to_string(),
            format!("Rollback to revision {}", revision),
        );
    deployment.spec.get_or_insert_with(Default::default).template = template;
}

/// Locate the template recorded for `revision`
async fn revision_template(
    cluster: &dyn ClusterApi,
    workload: &str,
    namespace: &str,
    revision: &str,
) -> Result<PodTemplateSpec> {
    let not_found = || ControllerError::RevisionNotFound {
        workload: workload.to_string(),
        namespace: namespace.to_string(),
        revision: revision.to_string(),
    };

    let record = owned_records(cluster, workload, namespace)
        .await?
        .into_iter()
        .find(|rs| revision_of(rs) == Some(revision))
        .ok_or_else(not_found)?;

    let mut template = record
        .spec
        .and_then(|spec| spec.template)
        .ok_or_else(not_found)?;

    if let Some(labels) = template
        .metadata
        .as_mut()
        .and_then(|meta| meta.labels.as_mut())
    {
        labels.remove(POD_TEMPLATE_HASH_LABEL);
    }

    Ok(template)
}

/// Point a Deployment's pod template at the one recorded for `revision`
pub async fn set_revision(
    cluster: &dyn ClusterApi,
    policy: &RetryPolicy,
    workload: &str,
    namespace: &str,
    revision: &str,
) -> Result<()> {
    let template = revision_template(cluster, workload, namespace, revision).await?;

    update_workload(cluster, policy, namespace, workload, |deployment| {
        apply_template(deployment, template.clone(), revision)
    })
    .await?;

    info!(workload, namespace, revision, "Rolled back deployment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::fixtures;

    fn cluster_with_history() -> InMemoryCluster {
        let cluster = InMemoryCluster::new();
        cluster.insert_deployment(fixtures::deployment("prod", "web", 3, "nginx:1.27"));
        cluster.insert_replica_set(fixtures::replica_set("prod", "web", "1", "nginx:1.25"));
        cluster.insert_replica_set(fixtures::replica_set("prod", "web", "2", "nginx:1.26"));
        cluster.insert_replica_set(fixtures::replica_set("prod", "web", "3", "nginx:1.27"));
        cluster
    }

    fn image(deployment: &Deployment) -> Option<String> {
        deployment
            .spec
            .as_ref()?
            .template
            .spec
            .as_ref()?
            .containers
            .first()?
            .image
            .clone()
    }

    fn replicas(deployment: &Deployment) -> Option<i32> {
        deployment.spec.as_ref()?.replicas
    }

    #[tokio::test]
    async fn test_rollback_replaces_template_only() {
        let cluster = cluster_with_history();

        set_revision(&cluster, &RetryPolicy::immediate(5), "web", "prod", "1")
            .await
            .unwrap();

        let deployment = cluster.deployment("prod", "web").unwrap();
        assert_eq!(image(&deployment).as_deref(), Some("nginx:1.25"));
        assert_eq!(replicas(&deployment), Some(3));

        let annotations = deployment.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get(CHANGE_CAUSE_ANNOTATION).map(String::as_str),
            Some("Rollback to revision 1")
        );

        let labels = deployment
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap();
        assert!(!labels.contains_key(POD_TEMPLATE_HASH_LABEL));
        assert_eq!(labels.get("app").map(String::as_str), Some("web"));
    }

    #[tokio::test]
    async fn test_unknown_revision_issues_no_update() {
        let cluster = cluster_with_history();

        let err = set_revision(&cluster, &RetryPolicy::immediate(5), "web", "prod", "42")
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::RevisionNotFound { .. }));
        assert_eq!(cluster.update_count(), 0);
        assert_eq!(
            image(&cluster.deployment("prod", "web").unwrap()).as_deref(),
            Some("nginx:1.27")
        );
    }

    #[tokio::test]
    async fn test_concurrent_scale_is_preserved() {
        let cluster = cluster_with_history();
        cluster.fail_next_updates_with(1, |d| {
            d.spec.get_or_insert_with(Default::default).replicas = Some(7);
        });

        set_revision(&cluster, &RetryPolicy::immediate(5), "web", "prod", "2")
            .await
            .unwrap();

        let deployment = cluster.deployment("prod", "web").unwrap();
        assert_eq!(cluster.update_count(), 2);
        assert_eq!(replicas(&deployment), Some(7));
        assert_eq!(image(&deployment).as_deref(), Some("nginx:1.26"));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let cluster = cluster_with_history();
        cluster.fail_next_updates(5);

        let err = set_revision(&cluster, &RetryPolicy::immediate(5), "web", "prod", "2")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::ConcurrencyExhausted { attempts: 5, .. }
        ));
        assert_eq!(cluster.update_count(), 5);
    }

    #[tokio::test]
    async fn test_revision_of_other_workload_not_used() {
        let cluster = cluster_with_history();
        cluster.insert_replica_set(fixtures::replica_set("prod", "api", "9", "api:2"));

        let err = set_revision(&cluster, &RetryPolicy::immediate(5), "web", "prod", "9")
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::RevisionNotFound { .. }));
    }
}
