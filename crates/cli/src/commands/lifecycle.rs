//! Revision, rollback, scale and restart commands

use anyhow::Result;
use chrono::{DateTime, Local};
use colored::Colorize;

use crate::client::{
    pod_path, workload_path, ActionResponse, ApiClient, RevisionsResponse, RollbackRequest,
    ScaleRequest,
};
use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};

/// Show the revision history of a deployment, newest first
pub async fn list_revisions(
    client: &ApiClient,
    namespace: &str,
    workload: &str,
    format: OutputFormat,
) -> Result<()> {
    let response: RevisionsResponse = client
        .get(&workload_path(namespace, workload, "revisions"), &[])
        .await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            if response.revisions.is_empty() {
                print_warning(&format!(
                    "No revisions recorded for {}/{}",
                    response.namespace, response.workload
                ));
                return Ok(());
            }

            println!(
                "{} {}/{}",
                "Revisions of".bold(),
                response.namespace,
                response.workload.cyan()
            );
            for (i, revision) in response.revisions.iter().enumerate() {
                if i == 0 {
                    println!("  {} {}", revision.green().bold(), "(latest)".dimmed());
                } else {
                    println!("  {}", revision);
                }
            }
        }
    }
    Ok(())
}

/// Roll a deployment back to a previous revision
pub async fn rollback(
    client: &ApiClient,
    namespace: &str,
    workload: &str,
    revision: &str,
    format: OutputFormat,
) -> Result<()> {
    let response: ActionResponse = client
        .post(
            &workload_path(namespace, workload, "rollback"),
            &RollbackRequest {
                revision: revision.to_string(),
            },
        )
        .await?;

    report(&response, format);
    Ok(())
}

/// Set the desired replica count of a deployment
pub async fn scale(
    client: &ApiClient,
    namespace: &str,
    workload: &str,
    replicas: i32,
    format: OutputFormat,
) -> Result<()> {
    let response: ActionResponse = client
        .post(
            &workload_path(namespace, workload, "scale"),
            &ScaleRequest { replicas },
        )
        .await?;

    report(&response, format);
    Ok(())
}

/// Trigger a rolling restart of a deployment
pub async fn restart_workload(
    client: &ApiClient,
    namespace: &str,
    workload: &str,
    format: OutputFormat,
) -> Result<()> {
    let response: ActionResponse = client
        .post(
            &workload_path(namespace, workload, "restart"),
            &serde_json::json!({}),
        )
        .await?;

    report(&response, format);
    if format == OutputFormat::Table {
        if let Some(stamp) = response.restarted_at.as_deref() {
            print_info(&format!("Restart stamped at {}", local_time(stamp)));
        }
    }
    Ok(())
}

/// Delete a pod so its controller recreates it
pub async fn restart_pod(
    client: &ApiClient,
    namespace: &str,
    pod: &str,
    format: OutputFormat,
) -> Result<()> {
    let response: ActionResponse = client
        .post(&pod_path(namespace, pod, "restart"), &serde_json::json!({}))
        .await?;

    report(&response, format);
    Ok(())
}

fn report(response: &ActionResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(response),
        OutputFormat::Table => print_success(&format!(
            "{}/{}: {}",
            response.namespace, response.name, response.message
        )),
    }
}

/// Render an RFC 3339 stamp in local time, or as-is if it does not parse
fn local_time(stamp: &str) -> String {
    DateTime::parse_from_rfc3339(stamp)
        .map(|t| {
            t.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %Z")
                .to_string()
        })
        .unwrap_or_else(|_| stamp.to_string())
}
