//! vmo-deps: deploy or clean up the scale-set dependencies of a worker.
//!
//! Runs one reconciliation against a local simulated cloud account:
//! - Loads the worker manifest and the cloud profile's fault domain table
//! - Restores the last persisted dependency status, if any
//! - Deploys or cleans up dependencies and persists the new status
//! - Writes the simulated account back to disk

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vmo_deps::config::{DEFAULT_TAG_KEY, DEFAULT_TAG_VALUE};
use vmo_deps::{
    DependencyAgent, FaultDomainTable, JsonStatusStore, MemoryResourceClient, ProvenanceTag,
    Worker,
};

/// Scale-set dependency reconciler
#[derive(Parser, Debug)]
#[command(name = "vmo-deps", version, about)]
struct Args {
    #[command(subcommand)]
    action: Action,

    /// Worker manifest (JSON)
    #[arg(long)]
    worker: PathBuf,

    /// Cloud profile with per-region fault domain counts (JSON)
    #[arg(long)]
    cloud_profile: PathBuf,

    /// Simulated cloud account state (JSON, created if missing)
    #[arg(long, default_value = "cloud-state.json")]
    cloud_state: PathBuf,

    /// Directory holding persisted dependency status per worker
    #[arg(long, default_value = "status")]
    status_dir: PathBuf,

    /// Provenance tag key stamped on created resources
    #[arg(long, default_value = DEFAULT_TAG_KEY)]
    tag_key: String,

    /// Provenance tag value stamped on created resources
    #[arg(long, default_value = DEFAULT_TAG_VALUE)]
    tag_value: String,

    /// Abort the run after this many seconds
    #[arg(long, default_value = "600")]
    timeout_secs: u64,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Action {
    /// Create or replace dependencies for all pools
    Deploy,
    /// Sweep orphans and delete dependencies of removed pools
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmo_deps=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let raw = tokio::fs::read(&args.worker)
        .await
        .with_context(|| format!("Failed to read worker {:?}", args.worker))?;
    let mut worker: Worker = serde_json::from_slice(&raw).context("Invalid worker manifest")?;
    let fault_domains = FaultDomainTable::load(&args.cloud_profile).await?;

    let store = Arc::new(
        JsonStatusStore::new(&args.status_dir)
            .await
            .context("Failed to open status directory")?,
    );
    if let Some(dependencies) = store
        .load(&worker.name)
        .await
        .context("Failed to load persisted status")?
    {
        info!(
            "Restored {} tracked dependencies for {}",
            dependencies.len(),
            worker.name
        );
        worker.status.vmo_dependencies = dependencies;
    }

    let client = Arc::new(
        MemoryResourceClient::load(&args.cloud_state)
            .await
            .context("Failed to load cloud state")?,
    );

    let agent = DependencyAgent::new(
        client.clone(),
        store,
        fault_domains,
        ProvenanceTag::new(args.tag_key.clone(), args.tag_value.clone()),
    );

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(cancel.clone(), Duration::from_secs(args.timeout_secs));

    info!("Starting {:?} for worker {}", args.action, worker.name);
    let result = match args.action {
        Action::Deploy => agent.deploy(&cancel, &worker).await,
        Action::Cleanup => agent.cleanup(&cancel, &worker).await,
    };

    // Remote side effects happened regardless of the outcome.
    client
        .save(&args.cloud_state)
        .await
        .context("Failed to save cloud state")?;

    match result {
        Ok(dependencies) => {
            println!("{}", serde_json::to_string_pretty(&dependencies)?);
            Ok(())
        }
        Err(e) => {
            error!("{:?} failed for worker {}: {}", args.action, worker.name, e);
            Err(e.into())
        }
    }
}

/// Cancel the run on Ctrl-C or when the deadline passes.
fn spawn_cancel_triggers(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Interrupted, cancelling run"),
            _ = tokio::time::sleep(timeout) => {
                warn!("Deadline of {:?} reached, cancelling run", timeout)
            }
            _ = cancel.cancelled() => return,
        }
        cancel.cancel();
    });
}
