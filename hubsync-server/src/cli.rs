use clap::Parser;
use hubsync_types::StorageBackend;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hubsync-server",
    about = "hubsync manager - conflates leaf hub bundles into the central store",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[arg(short, long, env = "HUBSYNC_CONFIG", help = "Path to the JSON config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "HUBSYNC_LOG_DIR", help = "Also write daily rolling logs to this directory")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "HUBSYNC_STORAGE", help = "Storage backend: postgres or memory")]
    pub storage: Option<StorageBackend>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "HUBSYNC_LISTEN_ADDR", help = "Bundle transport listen address")]
    pub listen_addr: Option<String>,

    #[arg(long, env = "HUBSYNC_WORKERS", help = "Number of dispatcher workers")]
    pub workers: Option<usize>,

    #[arg(long, env = "HUBSYNC_HANDLER_TIMEOUT_SECS")]
    pub handler_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "HUBSYNC_STATISTICS_INTERVAL",
        allow_hyphen_values = true,
        help = "Statistics log period (e.g. 1m, 30s); 0 or negative disables it"
    )]
    pub statistics_interval: Option<String>,

    #[arg(long, env = "HUBSYNC_METRICS_ADDR", help = "Prometheus exporter listen address")]
    pub metrics_addr: Option<String>,
}
