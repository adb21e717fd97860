//! Listing and ownership commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{pod_path, ApiClient, OwnerResponse, PodSummary, WorkloadSummary};
use crate::output::{color_ready, color_status, print_json, print_table, OutputFormat};

/// Row for the workloads table
#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Revision")]
    revision: String,
    #[tabled(rename = "Images")]
    images: String,
}

impl From<&WorkloadSummary> for WorkloadRow {
    fn from(w: &WorkloadSummary) -> Self {
        Self {
            namespace: w.namespace.clone(),
            name: w.name.clone(),
            ready: color_ready(w.ready_replicas, w.replicas),
            revision: w.revision.clone().unwrap_or_else(|| "-".to_string()),
            images: w.images.join(", "),
        }
    }
}

/// Row for the pods table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Restarts")]
    restarts: i32,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "ReplicaSet")]
    revision_record: String,
}

impl From<&PodSummary> for PodRow {
    fn from(p: &PodSummary) -> Self {
        Self {
            namespace: p.namespace.clone(),
            name: p.name.clone(),
            phase: color_status(&p.phase),
            restarts: p.restarts,
            node: p.node.clone().unwrap_or_else(|| "-".to_string()),
            revision_record: p.revision_record.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn namespace_query(namespace: Option<&str>) -> Vec<(&str, &str)> {
    namespace.map(|ns| vec![("namespace", ns)]).unwrap_or_default()
}

/// List deployments, in one namespace or across all of them
pub async fn list_workloads(
    client: &ApiClient,
    namespace: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let workloads: Vec<WorkloadSummary> = client
        .get("api/v1/workloads", &namespace_query(namespace))
        .await?;

    let rows: Vec<WorkloadRow> = workloads.iter().map(WorkloadRow::from).collect();
    print_table(&rows, &workloads, format);
    Ok(())
}

/// List pods, in one namespace or across all of them
pub async fn list_pods(
    client: &ApiClient,
    namespace: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let pods: Vec<PodSummary> = client
        .get("api/v1/pods", &namespace_query(namespace))
        .await?;

    let rows: Vec<PodRow> = pods.iter().map(PodRow::from).collect();
    print_table(&rows, &pods, format);
    Ok(())
}

/// Show the deployment that owns a pod
pub async fn show_owner(
    client: &ApiClient,
    namespace: &str,
    pod: &str,
    format: OutputFormat,
) -> Result<()> {
    let owner: OwnerResponse = client.get(&pod_path(namespace, pod, "owner"), &[]).await?;

    match format {
        OutputFormat::Json => print_json(&owner),
        OutputFormat::Table => {
            println!(
                "Pod {}/{} is owned by deployment {}",
                owner.namespace,
                owner.pod.cyan(),
                owner.workload.green().bold()
            );
        }
    }
    Ok(())
}
