use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quoteflow_provision::{load_schemas, register_all, wait_for_registry};
use quoteflow_registry::SchemaRegistryClient;

#[derive(Parser)]
#[command(name = "quoteflow-provision")]
#[command(about = "Register local Avro schemas with the schema registry")]
struct Args {
    /// Schema registry base URL
    #[arg(long, env = "SCHEMA_REGISTRY_URL", default_value = "http://localhost:8081")]
    registry_url: String,

    /// Directory holding *.avsc files
    #[arg(long, env = "SCHEMAS_DIR", default_value = "schemas")]
    schemas_dir: PathBuf,

    /// Seconds between registry reachability checks
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 2)]
    interval_secs: u64,

    /// Give up waiting for the registry after this many seconds
    #[arg(long, env = "DEADLINE_SECS")]
    deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let client = SchemaRegistryClient::new(&args.registry_url)?;

    info!(url = %client.base_url(), "Waiting for schema registry");
    wait_for_registry(
        &client,
        Duration::from_secs(args.interval_secs),
        args.deadline_secs.map(Duration::from_secs),
    )
    .await?;

    info!(dir = %args.schemas_dir.display(), "Loading schemas");
    let schemas = load_schemas(&args.schemas_dir)?;

    let summary = register_all(&client, &schemas).await;
    if !summary.is_success() {
        bail!(
            "{} of {} schema registrations failed",
            summary.failed.len(),
            schemas.len()
        );
    }

    info!(count = summary.registered.len(), "All schemas registered");
    Ok(())
}
