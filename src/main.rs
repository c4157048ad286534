//! cachewall binary entry point.
//!
//! Handles CLI argument parsing, tracing initialization, configuration
//! loading, and wiring the blocklist, cache, and event log into the proxy
//! server. The server runs until interrupted (Ctrl-C).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use cachewall::blocklist::Blocklist;
use cachewall::cache::ResponseCache;
use cachewall::cli::Cli;
use cachewall::config::ConfigLoader;
use cachewall::eventlog::EventLog;
use cachewall::proxy::ProxyServerBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);

    let listen_addr = config
        .server
        .listen_addr()
        .context("Invalid listen address")?;

    let blocklist_path = config.blocklist.path();
    let blocklist = Arc::new(Blocklist::from_file(&blocklist_path));
    info!(
        "Loaded {} blocked host pattern(s) from {:?}",
        blocklist.len(),
        blocklist_path
    );

    let cache = Arc::new(ResponseCache::with_ttl(config.cache.ttl()));
    let events = Arc::new(EventLog::new(config.log.dir()));

    // Ctrl-C flips the shutdown signal; the accept loop drains and stops
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let server = ProxyServerBuilder::new()
        .listen_addr(listen_addr)
        .blocklist(blocklist)
        .cache(cache)
        .events(events)
        .build(shutdown_rx);

    server.run().await.context("Proxy server failed")?;

    Ok(())
}

/// Initialize the tracing subscriber for operational logging.
///
/// # Verbosity Levels
/// - 0 (default): Only warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
