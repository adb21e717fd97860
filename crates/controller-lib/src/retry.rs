//! Bounded retry on optimistic-concurrency conflicts
//!
//! Each attempt must re-read the current object, apply its change and
//! submit the write; a conflict means another writer got there first and the
//! whole attempt is repeated after a backoff.

use crate::cluster::ClusterApi;
use crate::error::{ControllerError, ResourceKind, Result};
use crate::observability::ControllerMetrics;
use k8s_openapi::api::apps::v1::Deployment;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry budget and backoff for conflicting writes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy without delays between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Outcome of a retry loop that did not succeed
#[derive(Debug)]
pub enum RetryError {
    /// Every attempt conflicted
    Exhausted { attempts: u32 },
    /// An attempt failed with a non-conflict error
    Failed(ControllerError),
}

/// Run `attempt` until it succeeds, fails with a non-conflict error, or the
/// policy's attempt budget is spent
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> std::result::Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let metrics = ControllerMetrics::new();

    for n in 1..=max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() => {
                metrics.inc_conflict_retries();
                debug!(attempt = n, max_attempts, error = %err, "Write conflicted");
                if n < max_attempts {
                    let delay = policy.backoff(n);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            Err(err) => return Err(RetryError::Failed(err)),
        }
    }

    Err(RetryError::Exhausted {
        attempts: max_attempts,
    })
}

/// Re-read a Deployment, apply `mutate` and write it back, repeating the
/// whole cycle when the write loses an optimistic-concurrency race
///
/// `mutate` must only touch the fields the caller owns; everything else is
/// taken from the freshly read object on every attempt.
pub async fn update_workload<F>(
    cluster: &dyn ClusterApi,
    policy: &RetryPolicy,
    namespace: &str,
    workload: &str,
    mutate: F,
) -> Result<Deployment>
where
    F: Fn(&mut Deployment) + Send + Sync,
{
    let outcome = retry_on_conflict(policy, || async {
        let mut deployment = cluster
            .get_deployment(namespace, workload)
            .await
            .map_err(|e| {
                ControllerError::from_api(e, "get", ResourceKind::Workload, namespace, workload)
            })?;
        mutate(&mut deployment);
        cluster
            .update_deployment(&deployment)
            .await
            .map_err(|e| {
                ControllerError::from_api(e, "update", ResourceKind::Workload, namespace, workload)
            })
    })
    .await;

    outcome.map_err(|err| match err {
        RetryError::Exhausted { attempts } => ControllerError::ConcurrencyExhausted {
            workload: workload.to_string(),
            namespace: namespace.to_string(),
            attempts,
        },
        RetryError::Failed(err) => err,
    })
}
