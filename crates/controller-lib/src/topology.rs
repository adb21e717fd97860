//! Pod -> ReplicaSet -> Deployment ownership resolution

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, ResourceKind, Result};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::debug;

/// Owner reference kinds the controller follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerRef {
    /// A ReplicaSet, owner of pods
    RevisionRecord(String),
    /// A Deployment, owner of ReplicaSets
    Workload(String),
}

impl OwnerRef {
    /// Classify an owner reference, `None` for kinds outside the model
    pub fn classify(reference: &OwnerReference) -> Option<Self> {
        match reference.kind.as_str() {
            "ReplicaSet" => Some(OwnerRef::RevisionRecord(reference.name.clone())),
            "Deployment" => Some(OwnerRef::Workload(reference.name.clone())),
            _ => None,
        }
    }
}

/// Recognised owners of an object, in reference order
pub fn owners(meta: &ObjectMeta) -> impl Iterator<Item = OwnerRef> + '_ {
    meta.owner_references
        .iter()
        .flatten()
        .filter_map(OwnerRef::classify)
}

/// Name of the ReplicaSet owning a pod
pub fn revision_record_of(pod: &Pod) -> Option<String> {
    owners(&pod.metadata).find_map(|owner| match owner {
        OwnerRef::RevisionRecord(name) => Some(name),
        OwnerRef::Workload(_) => None,
    })
}

/// Name of the Deployment owning a ReplicaSet
pub fn workload_of(replica_set: &ReplicaSet) -> Option<String> {
    owners(&replica_set.metadata).find_map(|owner| match owner {
        OwnerRef::Workload(name) => Some(name),
        OwnerRef::RevisionRecord(_) => None,
    })
}

/// Resolve the Deployment that owns `pod` through its ReplicaSet
pub async fn resolve_owning_workload(cluster: &dyn ClusterApi, pod: &Pod) -> Result<String> {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
    let pod_name = pod.metadata.name.as_deref().unwrap_or_default();

    let record = revision_record_of(pod).ok_or_else(|| ControllerError::OwnershipNotFound {
        kind: ResourceKind::Pod,
        missing: ResourceKind::RevisionRecord,
        namespace: namespace.to_string(),
        name: pod_name.to_string(),
    })?;

    let replica_set = cluster
        .get_replica_set(namespace, &record)
        .await
        .map_err(|e| {
            ControllerError::from_api(e, "get", ResourceKind::RevisionRecord, namespace, &record)
        })?;

    let workload = workload_of(&replica_set).ok_or_else(|| ControllerError::OwnershipNotFound {
        kind: ResourceKind::RevisionRecord,
        missing: ResourceKind::Workload,
        namespace: namespace.to_string(),
        name: record.clone(),
    })?;

    debug!(
        pod = pod_name,
        namespace,
        replica_set = %record,
        workload = %workload,
        "Resolved owner"
    );
    Ok(workload)
}
