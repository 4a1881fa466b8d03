//! NimbusKV server entry point.
//!
//! Parses the command line, starts the executor task and serves clients
//! until Ctrl+C.

use clap::Parser;
use nimbuskv::commands::{spawn_executor, CommandHandler};
use nimbuskv::connection::ConnectionStats;
use nimbuskv::storage::StorageEngine;
use nimbuskv::{server, Config};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let handler = CommandHandler::new(StorageEngine::new());
    let (executor, executor_task) = spawn_executor(handler, config.queue_depth);
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        version = nimbuskv::VERSION,
        address = %config.bind_address(),
        queue_depth = config.queue_depth,
        "NimbusKV ready to accept connections"
    );

    tokio::select! {
        _ = server::serve(listener, executor, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received, stopping server...");
        }
    }

    // Sessions still hold executor handles; the task stops with the runtime.
    executor_task.abort();

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
