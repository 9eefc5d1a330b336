//! quoteflow-connector: Quote ingestion binary
//!
//! Streams Yahoo Finance quotes, validates each against the latest registered
//! schema of its asset class topic, and publishes it to Kafka.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quoteflow_connector_lib::{
    delivery_logger, Classifier, Config, Connector, Enricher, PipelineWriter, Publisher, Runner,
    ServerState, TopicBindings, Writer, YahooConnector,
};
use quoteflow_middleware::BusFactory;
use quoteflow_registry::SchemaRegistryClient;

const FEED_NAME: &str = "yahoo";

#[derive(Parser, Debug)]
#[command(name = "quoteflow-connector")]
#[command(about = "Yahoo Finance to Kafka quote ingestion")]
struct Args {
    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    health_addr: SocketAddr,
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

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        bus = ?config.bus_type,
        bootstrap_servers = %config.bootstrap_servers,
        registry = %config.schema_registry_url,
        topics = ?config.topics,
        flush_policy = ?config.flush_policy,
        "Loaded configuration"
    );

    let instruments = Arc::new(
        config
            .load_instruments()
            .with_context(|| format!("loading {}", config.instruments_path.display()))?,
    );
    info!(
        count = instruments.len(),
        asset_classes = ?instruments.asset_classes(),
        "Loaded instrument table"
    );

    let registry = SchemaRegistryClient::new(&config.schema_registry_url)?;
    let bindings = Arc::new(
        TopicBindings::resolve(&registry, &config.topics)
            .await
            .context("resolving topic schemas")?,
    );

    let bus = BusFactory::create(config.bus_type, &config.kafka_config(), delivery_logger())
        .context("creating bus producer")?;

    let writer = PipelineWriter::new(
        Classifier::new(Arc::clone(&instruments), bindings),
        Enricher::new(),
        Publisher::new(bus, config.flush_policy, config.flush_timeout),
    );
    let connector = YahooConnector::new(instruments.ids(), config.ws_url.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    run_with_writer(connector, writer, args.health_addr, shutdown_rx).await
}

async fn run_with_writer<C, W>(
    connector: C,
    writer: W,
    health_addr: SocketAddr,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    C: Connector,
    W: Writer,
{
    let mut runner = Runner::new(FEED_NAME, connector, writer);

    let server_state = ServerState::new(FEED_NAME, runner.state_handle(), runner.activity_handle());
    tokio::spawn(async move {
        if let Err(e) = quoteflow_connector_lib::run_server(health_addr, server_state).await {
            error!(error = %e, "Health server error");
        }
    });
    info!(addr = %health_addr, "Health server started");

    match runner.run(shutdown_rx).await {
        Ok(()) => {
            info!("Connector stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Connector error");
            std::process::exit(1);
        }
    }
}
