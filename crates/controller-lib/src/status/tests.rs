use super::*;
use crate::cluster::InMemoryCluster;
use crate::fixtures;
use crate::models::ResourceSample;
use crate::usage::StaticUsageSource;

fn sample(cpu_cores: f64, memory_mb: f64) -> ResourceSample {
    ResourceSample {
        cpu_cores,
        memory_mb,
    }
}

fn limits() -> SamplingLimits {
    SamplingLimits {
        workers: 4,
        timeout: Duration::from_millis(200),
    }
}

/// Two pods of `web` with an app and a sidecar container each
fn seeded() -> (InMemoryCluster, Arc<StaticUsageSource>) {
    let cluster = InMemoryCluster::new();
    cluster.insert_deployment(fixtures::deployment("prod", "web", 2, "nginx"));
    cluster.insert_pod(fixtures::pod(
        "prod",
        "web-a",
        "web",
        Some("web-rev1"),
        &["app", "sidecar"],
    ));
    cluster.insert_pod(fixtures::pod(
        "prod",
        "web-b",
        "web",
        Some("web-rev1"),
        &["app", "sidecar"],
    ));

    let usage = Arc::new(StaticUsageSource::new());
    for pod in ["web-a", "web-b"] {
        usage.set_sample("prod", pod, "app", sample(0.25, 128.0));
        usage.set_sample("prod", pod, "sidecar", sample(0.05, 32.0));
    }
    (cluster, usage)
}

#[tokio::test]
async fn test_snapshot_tree() {
    let (cluster, usage) = seeded();

    let snapshot = status_snapshot(&cluster, usage.clone(), Some("prod"), &limits())
        .await
        .unwrap();

    let web = snapshot.workload("prod", "web").unwrap();
    assert_eq!(web.status, "Running");
    assert_eq!(web.replicas, 2);
    assert_eq!(web.pods.len(), 2);

    let pod = &web.pods["web-a"];
    assert_eq!(pod.containers["app"], ContainerUsage::sampled(sample(0.25, 128.0)));
    assert!((pod.total_cpu_cores - 0.30).abs() < 1e-9);
    assert!((pod.total_memory_mb - 160.0).abs() < 1e-9);
    assert_eq!(snapshot.unavailable_samples(), 0);
    assert_eq!(usage.call_count(), 4);
}

#[tokio::test]
async fn test_workload_without_pods_has_empty_map() {
    let cluster = InMemoryCluster::new();
    cluster.insert_deployment(fixtures::deployment("prod", "idle", 0, "nginx"));
    let usage = Arc::new(StaticUsageSource::new());

    let snapshot = status_snapshot(&cluster, usage, None, &limits()).await.unwrap();

    let idle = snapshot.workload("prod", "idle").unwrap();
    assert!(idle.pods.is_empty());
    assert_eq!(idle.status, "Unknown");
}

#[tokio::test]
async fn test_single_failed_sample_is_zero_filled() {
    let (cluster, usage) = seeded();
    usage.fail("prod", "web-b", "sidecar", "metrics-server unavailable");

    let snapshot = status_snapshot(&cluster, usage, Some("prod"), &limits())
        .await
        .unwrap();

    let web = snapshot.workload("prod", "web").unwrap();
    let failed = &web.pods["web-b"].containers["sidecar"];
    assert_eq!(failed.cpu_cores, 0.0);
    assert_eq!(failed.memory_mb, 0.0);
    assert!(failed.unavailable.as_deref().unwrap().contains("metrics-server unavailable"));

    assert_eq!(
        web.pods["web-b"].containers["app"],
        ContainerUsage::sampled(sample(0.25, 128.0))
    );
    assert_eq!(
        web.pods["web-a"].containers["sidecar"],
        ContainerUsage::sampled(sample(0.05, 32.0))
    );
    assert_eq!(snapshot.unavailable_samples(), 1);
}

#[tokio::test]
async fn test_missing_sample_is_zero_filled() {
    let (cluster, usage) = seeded();
    cluster.insert_pod(fixtures::pod("prod", "web-c", "web", Some("web-rev1"), &["app"]));

    let snapshot = status_snapshot(&cluster, usage, Some("prod"), &limits())
        .await
        .unwrap();

    let entry = &snapshot.workload("prod", "web").unwrap().pods["web-c"].containers["app"];
    assert!(!entry.is_available());
    assert_eq!(entry.cpu_cores, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_sample_times_out() {
    let (cluster, usage) = seeded();
    usage.stall("prod", "web-a", "app");

    let snapshot = status_snapshot(&cluster, usage, Some("prod"), &limits())
        .await
        .unwrap();

    let web = snapshot.workload("prod", "web").unwrap();
    let stalled = &web.pods["web-a"].containers["app"];
    assert!(stalled.unavailable.as_deref().unwrap().contains("timed out"));
    assert!(web.pods["web-a"].containers["sidecar"].is_available());
}

#[tokio::test(start_paused = true)]
async fn test_reads_bounded_by_worker_limit() {
    let cluster = InMemoryCluster::new();
    cluster.insert_deployment(fixtures::deployment("prod", "web", 10, "nginx"));
    let usage = Arc::new(StaticUsageSource::new());
    for i in 0..10 {
        let pod = format!("web-{}", i);
        cluster.insert_pod(fixtures::pod(
            "prod",
            &pod,
            "web",
            Some("web-rev1"),
            &["app", "sidecar"],
        ));
        usage.set_sample("prod", &pod, "app", sample(0.1, 16.0));
        usage.set_sample("prod", &pod, "sidecar", sample(0.1, 16.0));
    }
    usage.set_delay(Duration::from_millis(50));

    let limits = SamplingLimits {
        workers: 3,
        timeout: Duration::from_secs(1),
    };
    let snapshot = status_snapshot(&cluster, usage.clone(), Some("prod"), &limits)
        .await
        .unwrap();

    assert_eq!(usage.call_count(), 20);
    assert_eq!(usage.peak_in_flight(), 3);
    assert_eq!(usage.in_flight(), 0);
    assert_eq!(snapshot.unavailable_samples(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_snapshot_aborts_reads() {
    let (cluster, usage) = seeded();
    usage.stall("prod", "web-a", "app");
    let limits = SamplingLimits {
        workers: 4,
        timeout: Duration::from_secs(10),
    };

    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        status_snapshot(&cluster, usage.clone(), Some("prod"), &limits),
    )
    .await;
    assert!(outcome.is_err());
    assert_eq!(usage.call_count(), 4);

    // Aborted tasks are dropped the next time the runtime gets control
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(usage.in_flight(), 0);
}

#[tokio::test]
async fn test_pods_of_other_workloads_excluded() {
    let (cluster, usage) = seeded();
    cluster.insert_deployment(fixtures::deployment("prod", "api", 1, "api:1"));
    cluster.insert_pod(fixtures::pod("prod", "api-a", "api", Some("api-rev1"), &["api"]));
    usage.set_sample("prod", "api-a", "api", sample(1.0, 512.0));

    let snapshot = status_snapshot(&cluster, usage, Some("prod"), &limits())
        .await
        .unwrap();

    assert_eq!(snapshot.workloads.len(), 2);
    let api = snapshot.workload("prod", "api").unwrap();
    assert_eq!(api.pods.keys().collect::<Vec<_>>(), vec!["api-a"]);
    assert!(!snapshot.workload("prod", "web").unwrap().pods.contains_key("api-a"));
}

#[tokio::test]
async fn test_deployment_without_match_labels() {
    let cluster = InMemoryCluster::new();
    let mut deployment = fixtures::deployment("prod", "web", 1, "nginx");
    if let Some(spec) = deployment.spec.as_mut() {
        spec.selector.match_labels = None;
    }
    cluster.insert_deployment(deployment);
    cluster.insert_pod(fixtures::pod("prod", "web-a", "web", Some("web-rev1"), &["app"]));

    let snapshot = status_snapshot(&cluster, Arc::new(StaticUsageSource::new()), None, &limits())
        .await
        .unwrap();
    assert!(snapshot.workload("prod", "web").unwrap().pods.is_empty());
}

#[tokio::test]
async fn test_cluster_unavailable_fails_snapshot() {
    let (cluster, usage) = seeded();
    cluster.set_unavailable(true);

    let err = status_snapshot(&cluster, usage, None, &limits())
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::RemoteUnavailable { .. }));
}

#[tokio::test]
async fn test_rendered_tree() {
    let (cluster, usage) = seeded();
    usage.fail("prod", "web-b", "sidecar", "scrape pending");
    cluster.insert_deployment(fixtures::deployment("prod", "idle", 0, "nginx"));

    let snapshot = status_snapshot(&cluster, usage, Some("prod"), &limits())
        .await
        .unwrap();
    let rendered = snapshot.to_string();

    assert!(rendered.contains("Deployment prod/idle (#1)"));
    assert!(rendered.contains("  No pods found"));
    assert!(rendered.contains("Deployment prod/web (#2)"));
    assert!(rendered.contains("  Pod: web-a (Running)"));
    assert!(rendered.contains("    Total CPU: 0.300 cores"));
    assert!(rendered.contains("      Memory: 128.000 MB"));
    assert!(rendered.contains("      Metrics unavailable: unavailable: scrape pending"));
}
