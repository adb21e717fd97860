//! In-memory usage source

use super::UsageSource;
use crate::cluster::ApiResult;
use crate::error::ApiError;
use crate::models::ResourceSample;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

type SampleKey = (String, String, String);

fn key(namespace: &str, pod: &str, container: &str) -> SampleKey {
    (namespace.to_string(), pod.to_string(), container.to_string())
}

/// Usage source backed by fixed samples
///
/// Containers without a sample report `NotFound`, mirroring a metrics
/// pipeline that has not scraped them yet.
#[derive(Default)]
pub struct StaticUsageSource {
    samples: DashMap<SampleKey, ResourceSample>,
    failures: DashMap<SampleKey, String>,
    stalled: DashSet<SampleKey>,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts a read as in flight until its future completes or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StaticUsageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sample reported for a container
    pub fn set_sample(&self, namespace: &str, pod: &str, container: &str, sample: ResourceSample) {
        self.samples.insert(key(namespace, pod, container), sample);
    }

    /// Make reads for a container fail with the given reason
    pub fn fail(&self, namespace: &str, pod: &str, container: &str, reason: impl Into<String>) {
        self.failures
            .insert(key(namespace, pod, container), reason.into());
    }

    /// Make reads for a container never complete
    pub fn stall(&self, namespace: &str, pod: &str, container: &str) {
        self.stalled.insert(key(namespace, pod, container));
    }

    /// Delay every read by `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of reads received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Reads started and not yet finished or dropped
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of reads in flight at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageSource for StaticUsageSource {
    async fn container_usage(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> ApiResult<ResourceSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let sample_key = key(namespace, pod, container);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.stalled.contains(&sample_key) {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = self.failures.get(&sample_key) {
            return Err(ApiError::Unavailable(reason.value().clone()));
        }

        self.samples
            .get(&sample_key)
            .map(|s| *s.value())
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "no metrics for container {} in pod {}/{}",
                    container, namespace, pod
                ))
            })
    }
}
