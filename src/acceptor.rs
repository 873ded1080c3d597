//! TCP acceptor: socket setup and the accept loop
//!
//! Accepting is bounded by a poll window so the loop re-checks the shutdown
//! flag a few times a minute even when nobody connects. Sessions are spawned
//! into a JoinSet; once the flag flips the loop stops accepting and waits
//! for the remaining sessions to wind down.

use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpListener, TcpSocket};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::server::ServerCommand;
use crate::session::{self, SessionConfig};

/// Resolve the configured address and bind the listening socket
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, AppError> {
    let addr = lookup_host(config.bind_addr())
        .await?
        .next()
        .ok_or_else(|| {
            AppError::Config(format!("no usable address for {}", config.bind_addr()))
        })?;

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    if config.reuse_addr {
        socket.set_reuseaddr(true)?;
    }
    socket.bind(addr)?;
    let listener = socket.listen(config.backlog)?;

    info!("Listening on {}", addr);
    Ok(listener)
}

/// Accept connections until the shutdown flag flips, then drain sessions
pub async fn run(
    listener: TcpListener,
    config: &ServerConfig,
    cmd_tx: mpsc::Sender<ServerCommand>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let session_config = SessionConfig::from(config);
    let mut sessions: JoinSet<()> = JoinSet::new();

    while !*shutdown_rx.borrow() {
        match timeout(config.accept_poll(), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("Connection established with {}", peer);
                let cmd_tx = cmd_tx.clone();
                let shutdown_rx = shutdown_rx.clone();
                let session_config = session_config.clone();
                sessions.spawn(async move {
                    if let Err(err) =
                        session::run_session(stream, peer, cmd_tx, shutdown_rx, session_config)
                            .await
                    {
                        warn!("Session for {} ended with error: {}", peer, err);
                    }
                });
            }
            Ok(Err(err)) => error!("Failed to accept connection: {}", err),
            // Poll window elapsed; loop around and re-check the flag.
            Err(_) => {}
        }

        // Reap sessions that have already finished.
        while sessions.try_join_next().is_some() {}
    }

    info!("Acceptor stopped; waiting for {} session(s)", sessions.len());
    while sessions.join_next().await.is_some() {}
}
