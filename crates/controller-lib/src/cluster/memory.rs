//! In-memory implementation of [`ClusterApi`]
//!
//! Behaves like the API server for the operations the controller uses:
//! every stored object carries a resource version, and replacing an object
//! with a stale version is rejected as a conflict. Call counters and conflict
//! injection make it suitable for exercising the controller without a cluster.

use super::{ApiResult, ClusterApi};
use crate::error::ApiError;
use async_trait::async_trait;
use dashmap::DashMap;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

type ObjectKey = (String, String);

/// Mutation applied to the stored deployment when an injected conflict fires
type ConcurrentWriter = Box<dyn Fn(&mut Deployment) + Send + Sync>;

/// In-memory cluster store
#[derive(Default)]
pub struct InMemoryCluster {
    deployments: DashMap<ObjectKey, Deployment>,
    replica_sets: DashMap<ObjectKey, ReplicaSet>,
    pods: DashMap<ObjectKey, Pod>,
    version: AtomicU64,
    calls: AtomicUsize,
    update_calls: AtomicUsize,
    deleted_pods: Mutex<Vec<ObjectKey>>,
    pending_conflicts: AtomicU32,
    concurrent_writer: Mutex<Option<ConcurrentWriter>>,
    unavailable: AtomicBool,
}

fn object_key(meta: &ObjectMeta) -> ObjectKey {
    (
        meta.namespace.clone().unwrap_or_else(|| "default".to_string()),
        meta.name.clone().unwrap_or_default(),
    )
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn matches_selector(pod: &Pod, selector: &BTreeMap<String, String>) -> bool {
    let labels = pod.metadata.labels.as_ref();
    selector
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn stamp(&self, meta: &mut ObjectMeta) {
        if meta.namespace.is_none() {
            meta.namespace = Some("default".to_string());
        }
        meta.resource_version = Some(self.next_version());
    }

    fn record_call(&self) -> ApiResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    /// Store a deployment, assigning a fresh resource version
    pub fn insert_deployment(&self, mut deployment: Deployment) {
        self.stamp(&mut deployment.metadata);
        self.deployments
            .insert(object_key(&deployment.metadata), deployment);
    }

    /// Store a ReplicaSet
    pub fn insert_replica_set(&self, mut replica_set: ReplicaSet) {
        self.stamp(&mut replica_set.metadata);
        self.replica_sets
            .insert(object_key(&replica_set.metadata), replica_set);
    }

    /// Store a pod
    pub fn insert_pod(&self, mut pod: Pod) {
        self.stamp(&mut pod.metadata);
        self.pods.insert(object_key(&pod.metadata), pod);
    }

    /// Current stored deployment, without counting as an API call
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.deployments
            .get(&key(namespace, name))
            .map(|d| d.value().clone())
    }

    /// Whether a pod is currently stored
    pub fn has_pod(&self, namespace: &str, name: &str) -> bool {
        self.pods.contains_key(&key(namespace, name))
    }

    /// Reject the next `count` deployment updates with a conflict
    pub fn fail_next_updates(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Reject the next `count` deployment updates with a conflict, applying
    /// `writer` to the stored deployment each time as if another client had
    /// won the race
    pub fn fail_next_updates_with<F>(&self, count: u32, writer: F)
    where
        F: Fn(&mut Deployment) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.concurrent_writer.lock() {
            *slot = Some(Box::new(writer));
        }
        self.fail_next_updates(count);
    }

    /// Make every subsequent call fail as if the API server were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of API calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of deployment update attempts received
    pub fn update_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Pods deleted so far, as `(namespace, name)` in call order
    pub fn deleted_pods(&self) -> Vec<(String, String)> {
        self.deleted_pods
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    fn take_injected_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn run_concurrent_writer(&self, object: &ObjectKey) {
        let Ok(writer) = self.concurrent_writer.lock() else {
            return;
        };
        if let Some(writer) = writer.as_ref() {
            if let Some(mut stored) = self.deployments.get_mut(object) {
                writer(&mut *stored);
                stored.metadata.resource_version = Some(self.next_version());
            }
        }
    }
}

fn sorted<T, F>(mut items: Vec<T>, meta: F) -> Vec<T>
where
    F: Fn(&T) -> &ObjectMeta,
{
    items.sort_by_key(|item| object_key(meta(item)));
    items
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn get_deployment(&self, namespace: &str, name: &str) -> ApiResult<Deployment> {
        self.record_call()?;
        self.deployment(namespace, name)
            .ok_or_else(|| ApiError::NotFound(format!("deployments \"{}\" not found", name)))
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> ApiResult<Vec<Deployment>> {
        self.record_call()?;
        let items = self
            .deployments
            .iter()
            .filter(|entry| namespace.map_or(true, |ns| entry.key().0 == ns))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted(items, |d: &Deployment| &d.metadata))
    }

    async fn update_deployment(&self, deployment: &Deployment) -> ApiResult<Deployment> {
        self.record_call()?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let object = object_key(&deployment.metadata);

        if self.take_injected_conflict() {
            self.run_concurrent_writer(&object);
            return Err(ApiError::Conflict(format!(
                "deployments.apps \"{}\": the object has been modified",
                object.1
            )));
        }

        let mut stored = self
            .deployments
            .get_mut(&object)
            .ok_or_else(|| ApiError::NotFound(format!("deployments \"{}\" not found", object.1)))?;

        if stored.metadata.resource_version != deployment.metadata.resource_version {
            return Err(ApiError::Conflict(format!(
                "stale resource version for deployments.apps \"{}\"",
                object.1
            )));
        }

        let mut updated = deployment.clone();
        updated.metadata.resource_version = Some(self.next_version());
        *stored = updated.clone();
        Ok(updated)
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> ApiResult<ReplicaSet> {
        self.record_call()?;
        self.replica_sets
            .get(&key(namespace, name))
            .map(|rs| rs.value().clone())
            .ok_or_else(|| ApiError::NotFound(format!("replicasets \"{}\" not found", name)))
    }

    async fn list_replica_sets(&self, namespace: &str) -> ApiResult<Vec<ReplicaSet>> {
        self.record_call()?;
        let items = self
            .replica_sets
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted(items, |rs: &ReplicaSet| &rs.metadata))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> ApiResult<Pod> {
        self.record_call()?;
        self.pods
            .get(&key(namespace, name))
            .map(|pod| pod.value().clone())
            .ok_or_else(|| ApiError::NotFound(format!("pods \"{}\" not found", name)))
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&BTreeMap<String, String>>,
    ) -> ApiResult<Vec<Pod>> {
        self.record_call()?;
        let items = self
            .pods
            .iter()
            .filter(|entry| namespace.map_or(true, |ns| entry.key().0 == ns))
            .filter(|entry| selector.map_or(true, |s| matches_selector(entry.value(), s)))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted(items, |p: &Pod| &p.metadata))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> ApiResult<()> {
        self.record_call()?;
        let object = key(namespace, name);
        if self.pods.remove(&object).is_none() {
            return Err(ApiError::NotFound(format!("pods \"{}\" not found", name)));
        }
        if let Ok(mut deleted) = self.deleted_pods.lock() {
            deleted.push(object);
        }
        Ok(())
    }
}
