//! Multi-User TCP Chat Server - Entry Point
//!
//! Wires together the ChatServer actor, the signal handler, and the acceptor.

use std::env;
use std::path::Path;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatterd::acceptor;
use chatterd::config::ServerConfig;
use chatterd::server::{ChatServer, ServerCommand};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chatterd=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatterd=info")),
        )
        .init();

    // Optional JSON config file from the command line
    let config_path = env::args().nth(1);
    let config = ServerConfig::load(config_path.as_deref().map(Path::new))?;

    let listener = acceptor::bind(&config).await?;

    // Create the ChatServer actor channel and start it
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_handle = tokio::spawn(ChatServer::new(cmd_rx, shutdown_tx).run());

    // Ctrl-C routes through the actor like an operator /DIE; the task also
    // ends when a /DIE flips the flag first, releasing its command sender.
    let signal_tx = cmd_tx.clone();
    let mut signal_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        info!("Ctrl-C received");
                        let _ = signal_tx.send(ServerCommand::Shutdown).await;
                    }
                    Err(err) => error!("Failed to listen for ctrl-c: {}", err),
                }
            }
            _ = signal_shutdown.changed() => {}
        }
    });

    acceptor::run(listener, &config, cmd_tx.clone(), shutdown_rx).await;

    // Every session has drained; release the last sender so the actor exits.
    drop(cmd_tx);
    server_handle.await?;

    info!("Server stopped");
    Ok(())
}
