//! Status snapshot command

use anyhow::Result;

use crate::client::{ApiClient, StatusSnapshot};
use crate::output::{print_json, OutputFormat};

/// Print the status tree of every deployment, or the snapshot as JSON
pub async fn show_status(
    client: &ApiClient,
    namespace: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let mut query = vec![];
    if let Some(ns) = namespace {
        query.push(("namespace", ns));
    }

    match format {
        OutputFormat::Table => {
            query.push(("format", "text"));
            let tree = client.get_text("api/v1/status", &query).await?;
            println!("{}", tree.trim_end());
        }
        OutputFormat::Json => {
            let snapshot: StatusSnapshot = client.get("api/v1/status", &query).await?;
            print_json(&snapshot);
        }
    }
    Ok(())
}
