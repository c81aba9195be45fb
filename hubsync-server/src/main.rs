//! hubsync Server - Headless Manager Daemon
//!
//! Receives bundles from leaf hubs over the JSON-lines transport, conflates
//! them per (hub, bundle type) and applies them to the central store:
//! - Storage: PostgreSQL (default) or in-memory
//! - Metrics: optional Prometheus exporter
//! - Shutdown: Ctrl-C stops the listener, consumer, workers and statistics timer

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

use cli::Cli;
use hubsync_core::transport::TcpBundleListener;
use hubsync_core::{MemoryStore, PostgresStore, StatusStore, SyncEngine};
use hubsync_types::{ManagerConfig, StorageBackend};

/// Inbound messages buffered between the listener and the consumer.
const TRANSPORT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli)?;

    let mut config = config::load_config(cli.config.as_deref())?;
    config::apply_overrides(&mut config, &cli);
    config.validate()?;

    info!("🚀 hubsync manager starting (storage: {})", config.storage);

    if let Some(addr) = &config.metrics_listen_addr {
        let addr: SocketAddr =
            addr.parse().with_context(|| format!("invalid metrics address {addr}"))?;
        hubsync_core::prometheus::init_metrics(addr)?;
    }

    let store = open_store(&config).await?;
    let mut engine = SyncEngine::from_config(&config, store)?;

    let listener = TcpBundleListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    let (receiver, accept_task) = listener.spawn(TRANSPORT_BUFFER, engine.shutdown_signal());
    engine.start(receiver);

    info!("🔌 Accepting leaf hub bundles on {}", config.listen_addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let statistics = Arc::clone(engine.statistics());
    engine.shutdown().await;
    if let Err(err) = accept_task.await {
        tracing::warn!("Listener task ended abnormally: {}", err);
    }

    let snapshot = statistics.snapshot();

    info!(
        "✅ Stopped after {} bundles from {} leaf hubs",
        snapshot.total_received(),
        snapshot.conflation_units
    );
    Ok(())
}

async fn open_store(config: &ManagerConfig) -> Result<Arc<dyn StatusStore>> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        },
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().context("database_url is not set")?;
            let store = PostgresStore::connect(url, config.max_db_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            store.run_migrations().await?;
            info!("📊 Connected to PostgreSQL, migrations applied");
            Ok(Arc::new(store))
        },
    }
}

/// Console logging filtered by `--log-level`/`RUST_LOG`, plus a daily rolling
/// file when `--log-dir` is set. The returned guard flushes the file writer.
fn init_tracing(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log filter {:?}", cli.log_level))?;
    let console = tracing_subscriber::fmt::layer().with_target(false);

    let Some(dir) = &cli.log_dir else {
        tracing_subscriber::registry().with(filter).with(console).try_init()?;
        return Ok(None);
    };

    let appender = tracing_appender::rolling::daily(dir, "hubsync-server.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);

    tracing_subscriber::registry().with(filter).with(console).with(file).try_init()?;
    Ok(Some(guard))
}
