//! Error types for controller operations
//!
//! Collaborator failures are reported as [`ApiError`]; controller operations
//! wrap them with the workload/namespace/revision they were acting on and
//! return a [`ControllerError`].

use std::fmt;
use thiserror::Error;

/// Kinds of cluster objects the controller reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Workload (Deployment)
    Workload,
    /// Revision record (ReplicaSet)
    RevisionRecord,
    /// Pod
    Pod,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Workload => "Deployment",
            ResourceKind::RevisionRecord => "ReplicaSet",
            ResourceKind::Pod => "Pod",
        };
        f.write_str(name)
    }
}

/// Errors reported by the cluster and metrics collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The write carried a stale resource version
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport, authentication or server failure
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }
}

/// Errors returned by controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Workload, pod or revision record absent
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    /// A link of the pod -> ReplicaSet -> Deployment chain is missing
    #[error("no {missing} owner reference found on {kind} {namespace}/{name}")]
    OwnershipNotFound {
        kind: ResourceKind,
        missing: ResourceKind,
        namespace: String,
        name: String,
    },

    /// Replica target outside `0..=max`
    #[error("invalid replica count {target} for {namespace}/{workload}: must be between 0 and {max}")]
    InvalidScale {
        workload: String,
        namespace: String,
        target: i32,
        max: i32,
    },

    /// Requested revision is not in the workload's history
    #[error("revision {revision} not found for deployment {namespace}/{workload}")]
    RevisionNotFound {
        workload: String,
        namespace: String,
        revision: String,
    },

    /// Every attempt of the conflict retry loop lost the race
    #[error("failed to update deployment {namespace}/{workload} after {attempts} conflicting attempts")]
    ConcurrencyExhausted {
        workload: String,
        namespace: String,
        attempts: u32,
    },

    /// Stale resource version on a single write; retried by the caller
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: ResourceKind,
        namespace: String,
        name: String,
        message: String,
    },

    /// Transport or authentication failure talking to a collaborator
    #[error("failed to {context}: {source}")]
    RemoteUnavailable {
        context: String,
        #[source]
        source: ApiError,
    },
}

impl ControllerError {
    /// Wrap a collaborator error raised while acting on a single named object
    pub fn from_api(
        err: ApiError,
        action: &str,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Self {
        match err {
            ApiError::NotFound(_) => ControllerError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            ApiError::Conflict(message) => ControllerError::Conflict {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                message,
            },
            source @ ApiError::Unavailable(_) => ControllerError::RemoteUnavailable {
                context: format!("{} {} {}/{}", action, kind, namespace, name),
                source,
            },
        }
    }

    /// Wrap a collaborator error raised while listing objects
    pub fn from_list(err: ApiError, kind: ResourceKind, namespace: Option<&str>) -> Self {
        let scope = match namespace {
            Some(ns) => format!("namespace {}", ns),
            None => "all namespaces".to_string(),
        };
        ControllerError::RemoteUnavailable {
            context: format!("list {} objects in {}", kind, scope),
            source: err,
        }
    }

    /// Whether this error is a lost optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, ControllerError::Conflict { .. })
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
