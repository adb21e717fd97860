//! Builders for Deployment, ReplicaSet and Pod objects
//!
//! Used to seed [`InMemoryCluster`](crate::InMemoryCluster) in tests and
//! local runs without an API server.

use crate::revisions::REVISION_ANNOTATION;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, ReplicaSet, ReplicaSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerStatus, Pod, PodSpec, PodStatus, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

fn labels(app: &str) -> BTreeMap<String, String> {
    [("app".to_string(), app.to_string())].into()
}

fn owner(kind: &str, api_version: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{}-uid", name),
        controller: Some(true),
        ..Default::default()
    }
}

/// Pod template running one container per image
pub fn template(app: &str, images: &[&str]) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels(app)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: images
                .iter()
                .enumerate()
                .map(|(i, image)| Container {
                    name: if i == 0 {
                        app.to_string()
                    } else {
                        format!("{}-{}", app, i)
                    },
                    image: Some(image.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
    }
}

/// Deployment selecting pods labelled `app=<name>`
pub fn deployment(namespace: &str, name: &str, replicas: i32, image: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels(name)),
                ..Default::default()
            },
            template: template(name, &[image]),
            ..Default::default()
        }),
        status: None,
    }
}

/// ReplicaSet owned by `workload`, annotated with `revision`
pub fn replica_set(
    namespace: &str,
    workload: &str,
    revision: &str,
    image: &str,
) -> ReplicaSet {
    let hash = format!("rev{}", revision);
    let mut template = template(workload, &[image]);
    if let Some(meta) = template.metadata.as_mut() {
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .insert("pod-template-hash".to_string(), hash.clone());
    }

    ReplicaSet {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}", workload, hash)),
            namespace: Some(namespace.to_string()),
            annotations: Some([(REVISION_ANNOTATION.to_string(), revision.to_string())].into()),
            owner_references: Some(vec![owner("Deployment", "apps/v1", workload)]),
            ..Default::default()
        },
        spec: Some(ReplicaSetSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels(workload)),
                ..Default::default()
            },
            template: Some(template),
            ..Default::default()
        }),
        status: None,
    }
}

/// Running pod labelled `app=<workload>`, owned by `replica_set`, with one
/// ready container status per entry of `containers`
pub fn pod(
    namespace: &str,
    name: &str,
    workload: &str,
    replica_set: Option<&str>,
    containers: &[&str],
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(workload)),
            owner_references: replica_set.map(|rs| vec![owner("ReplicaSet", "apps/v1", rs)]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: containers
                .iter()
                .map(|c| Container {
                    name: c.to_string(),
                    ..Default::default()
                })
                .collect(),
            node_name: Some("node-1".to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            container_statuses: Some(
                containers
                    .iter()
                    .map(|c| ContainerStatus {
                        name: c.to_string(),
                        ready: true,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
    }
}
