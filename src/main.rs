//! rodgate - A Hot Rod Compatible Binary Cache Endpoint
//!
//! This is the main entry point for the rodgate server.
//! It sets up the TCP listener, the stores, and handles incoming connections.

use clap::Parser;
use rodgate::commands::CommandProcessor;
use rodgate::config::Config;
use rodgate::connection::{handle_connection, ConnectionStats};
use rodgate::protocol::RequestDecoder;
use rodgate::storage::{MultimapStore, StorageEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!("rodgate v{}", rodgate::VERSION);

    // Create the stores (shared across all connections)
    let storage = if config.caches.is_empty() {
        info!("Serving any cache name");
        Arc::new(StorageEngine::new())
    } else {
        info!(caches = ?config.caches, "Serving configured caches");
        Arc::new(StorageEngine::with_caches(config.caches.iter().cloned()))
    };
    let multimaps = Arc::new(MultimapStore::new());
    let processor = CommandProcessor::new(storage, multimaps);
    let decoder = RequestDecoder::new(config.max_frame_size);

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, processor, decoder, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    processor: CommandProcessor,
    decoder: RequestDecoder,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let processor = processor.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, processor, decoder, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
