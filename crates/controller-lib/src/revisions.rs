//! Revision history of a Deployment
//!
//! Every rollout leaves a ReplicaSet behind, annotated with the revision
//! number it was created for. Revision numbers are compared numerically so
//! that "10" ranks above "2".

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, ResourceKind, Result};
use crate::topology::workload_of;
use k8s_openapi::api::apps::v1::ReplicaSet;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Annotation carrying the revision number of a ReplicaSet
pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Revision annotation of a ReplicaSet
pub fn revision_of(replica_set: &ReplicaSet) -> Option<&str> {
    replica_set
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(REVISION_ANNOTATION))
        .map(String::as_str)
}

/// Newest-first ordering; ids that are not integers go last
fn newest_first(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => b.cmp(&a),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => b.cmp(a),
    }
}

/// Deduplicate revision ids and order them newest first
pub fn order_revisions<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut ordered: Vec<String> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    ordered.sort_by(|a, b| newest_first(a, b));
    ordered
}

/// ReplicaSets in `namespace` owned by the Deployment `workload`
pub async fn owned_records(
    cluster: &dyn ClusterApi,
    workload: &str,
    namespace: &str,
) -> Result<Vec<ReplicaSet>> {
    let records = cluster
        .list_replica_sets(namespace)
        .await
        .map_err(|e| ControllerError::from_list(e, ResourceKind::RevisionRecord, Some(namespace)))?;

    Ok(records
        .into_iter()
        .filter(|rs| workload_of(rs).as_deref() == Some(workload))
        .collect())
}

/// Revision ids of a Deployment, newest first
pub async fn list_revisions(
    cluster: &dyn ClusterApi,
    workload: &str,
    namespace: &str,
) -> Result<Vec<String>> {
    cluster
        .get_deployment(namespace, workload)
        .await
        .map_err(|e| {
            ControllerError::from_api(e, "get", ResourceKind::Workload, namespace, workload)
        })?;

    let records = owned_records(cluster, workload, namespace).await?;
    Ok(order_revisions(
        records
            .iter()
            .filter_map(revision_of)
            .map(str::to_string),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::fixtures;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_numeric_order() {
        assert_eq!(order_revisions(ids(&["1", "2", "10"])), ids(&["10", "2", "1"]));
    }

    #[test]
    fn test_duplicates_removed() {
        assert_eq!(order_revisions(ids(&["3", "3", "1", "3"])), ids(&["3", "1"]));
    }

    #[test]
    fn test_non_numeric_sorted_last() {
        assert_eq!(
            order_revisions(ids(&["beta", "2", "alpha", "11"])),
            ids(&["11", "2", "beta", "alpha"])
        );
    }

    #[tokio::test]
    async fn test_list_revisions_filters_by_owner() {
        let cluster = InMemoryCluster::new();
        cluster.insert_deployment(fixtures::deployment("prod", "web", 3, "nginx:1.27"));
        for revision in ["1", "2", "10"] {
            cluster.insert_replica_set(fixtures::replica_set("prod", "web", revision, "nginx"));
        }
        cluster.insert_replica_set(fixtures::replica_set("prod", "api", "4", "api:1"));
        cluster.insert_replica_set(fixtures::replica_set("staging", "web", "7", "nginx"));

        let mut unannotated = fixtures::replica_set("prod", "web", "99", "nginx");
        unannotated.metadata.annotations = None;
        unannotated.metadata.name = Some("web-orphan".into());
        cluster.insert_replica_set(unannotated);

        let revisions = list_revisions(&cluster, "web", "prod").await.unwrap();
        assert_eq!(revisions, ids(&["10", "2", "1"]));
    }

    #[tokio::test]
    async fn test_missing_workload() {
        let cluster = InMemoryCluster::new();
        let err = list_revisions(&cluster, "web", "prod").await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::NotFound {
                kind: ResourceKind::Workload,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_workload_without_history() {
        let cluster = InMemoryCluster::new();
        cluster.insert_deployment(fixtures::deployment("prod", "web", 1, "nginx"));
        assert!(list_revisions(&cluster, "web", "prod").await.unwrap().is_empty());
    }
}
