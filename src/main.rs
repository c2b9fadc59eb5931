use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use dispo::config::{Config, Overrides};
use dispo::domains::DomainCache;
use dispo::fetch::HttpFetcher;
use dispo::scheduler::Scheduler;
use dispo::stats::{self, Stats};

#[derive(Parser)]
#[command(name = "dispo")]
#[command(about = "Disposable email domain lookup service", long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Snapshot file (overrides config)
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = Config::load(&args.config).await?;
    let config_found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    config.apply(Overrides {
        host: args.bind,
        port: args.port,
        snapshot_path: args.snapshot,
    });

    dispo::logging::init(&config.logging);
    info!("Starting dispo...");

    if !config_found {
        warn!(
            path = %args.config.display(),
            "Config file not found, using defaults without sources"
        );
    }
    if config.sources.is_empty() {
        warn!("No domain sources configured, only the snapshot contents will be served");
    }
    for source in &config.sources {
        info!(source = %source, "Loaded domain source from config");
    }

    let fetcher = Arc::new(HttpFetcher::new(&config.refresh).context("Failed to build HTTP client")?);
    let cache = Arc::new(
        DomainCache::new(config.sources.clone(), config.snapshot_path.clone(), fetcher)
            .with_max_line_len(config.refresh.max_line_len),
    );

    if cache.load_snapshot().await.is_err() {
        warn!("Serving partial snapshot contents until the first refresh completes");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(cache.clone(), config.refresh.interval()).spawn(shutdown_rx);

    let stats = Arc::new(Stats::new());
    if config.stats.log_interval_seconds > 0 {
        stats::spawn_reporter(
            stats.clone(),
            cache.clone(),
            Duration::from_secs(config.stats.log_interval_seconds),
        );
    }

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(addr = %listener.local_addr()?, domains = cache.size(), "HTTP server listening");

    axum::serve(listener, dispo::server::router(cache, stats))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    scheduler.await?;

    Ok(())
}
