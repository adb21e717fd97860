//! Workload Controller CLI
//!
//! A command-line tool for inspecting deployments and pods and driving
//! rollbacks, scaling and restarts through the workload controller API.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{lifecycle, status, workloads};
use config::Config;
use output::{print_error, OutputFormat};

/// Workload Controller CLI
#[derive(Parser)]
#[command(name = "wlctl")]
#[command(author, version, about = "CLI for the Workload Controller", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via WLCTL_API_URL env var)
    #[arg(long, env = "WLCTL_API_URL")]
    pub api_url: Option<String>,

    /// Namespace to operate in (list commands default to all namespaces)
    #[arg(long, short, global = true)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List deployments
    Workloads,

    /// List pods
    Pods,

    /// Show the deployment that owns a pod
    Owner {
        /// Pod name
        pod: String,
    },

    /// Show the revision history of a deployment
    Revisions {
        /// Deployment name
        workload: String,
    },

    /// Roll a deployment back to a previous revision
    Rollback {
        /// Deployment name
        workload: String,

        /// Revision to roll back to
        revision: String,
    },

    /// Set the replica count of a deployment
    Scale {
        /// Deployment name
        workload: String,

        /// Desired replica count
        #[arg(allow_negative_numbers = true)]
        replicas: i32,
    },

    /// Restart a deployment or a single pod
    #[command(subcommand)]
    Restart(RestartCommands),

    /// Show deployments with per-pod and per-container resource usage
    Status,
}

#[derive(Subcommand)]
pub enum RestartCommands {
    /// Trigger a rolling restart of a deployment
    Workload {
        /// Deployment name
        name: String,
    },

    /// Delete a pod so it is recreated
    Pod {
        /// Pod name
        name: String,
    },
}

async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
    let format = cli.format;
    let listed = cli.namespace.as_deref();
    let namespace = config.namespace(cli.namespace.as_deref());

    match cli.command {
        Commands::Workloads => workloads::list_workloads(&client, listed, format).await,
        Commands::Pods => workloads::list_pods(&client, listed, format).await,
        Commands::Owner { pod } => workloads::show_owner(&client, &namespace, &pod, format).await,
        Commands::Revisions { workload } => {
            lifecycle::list_revisions(&client, &namespace, &workload, format).await
        }
        Commands::Rollback { workload, revision } => {
            lifecycle::rollback(&client, &namespace, &workload, &revision, format).await
        }
        Commands::Scale { workload, replicas } => {
            lifecycle::scale(&client, &namespace, &workload, replicas, format).await
        }
        Commands::Restart(restart_cmd) => match restart_cmd {
            RestartCommands::Workload { name } => {
                lifecycle::restart_workload(&client, &namespace, &name, format).await
            }
            RestartCommands::Pod { name } => {
                lifecycle::restart_pod(&client, &namespace, &name, format).await
            }
        },
        Commands::Status => status::show_status(&client, listed, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match Config::load() {
        Ok(config) => dispatch(cli, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
