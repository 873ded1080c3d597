//! Per-connection session: framing, handshake, and the line loop
//!
//! A session owns its socket end to end. It frames the byte stream into
//! lines, walks the peer through the username handshake, then loops over
//! three event sources: inbound lines (parsed and routed to the actor),
//! outbound lines (drained from the queue the actor writes replies and
//! broadcasts into), and the shutdown flag. The actor closing the outbound
//! queue is a termination signal in itself: that is how `/QUIT` and `/KILL`
//! end a connection.
//!
//! Generic over the stream type so tests can drive a session over an
//! in-memory duplex pipe instead of a TCP socket.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::protocol::{self, Input};
use crate::server::{Registration, ServerCommand};
use crate::types::ClientId;

/// The per-session slice of the server configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound queue capacity
    pub outbound_buffer: usize,
    /// Idle cutoff; `None` disables the deadline
    pub read_timeout: Option<Duration>,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            outbound_buffer: config.outbound_buffer,
            read_timeout: config.read_timeout(),
        }
    }
}

/// Drive one client connection from accept to close
///
/// Whatever ends the session (peer close, I/O error, idle deadline, the
/// actor dropping the outbound queue), the actor receives a `Disconnect`
/// for this client before the function returns.
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
    mut shutdown: watch::Receiver<bool>,
    config: SessionConfig,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client_id = ClientId::new();
    debug!("Session {} started for {}", client_id, peer);

    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(protocol::MAX_LINE_LEN));
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer);

    cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            sender: outbound_tx,
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;

    let result = drive(
        &mut framed,
        client_id,
        &cmd_tx,
        &mut shutdown,
        outbound_rx,
        &config,
    )
    .await;

    // Idempotent at the actor; a no-op when /QUIT or /KILL got there first.
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;

    debug!("Session {} ended for {}", client_id, peer);
    // Dropping the framed stream closes the connection; every write path
    // flushed as it sent, so nothing is left buffered.
    result
}

/// Banner, handshake, then the main line loop
async fn drive<S>(
    framed: &mut Framed<S, LinesCodec>,
    client_id: ClientId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    shutdown: &mut watch::Receiver<bool>,
    mut outbound_rx: mpsc::Receiver<String>,
    config: &SessionConfig,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(protocol::WELCOME_BANNER).await?;

    let Some(username) = claim_username(framed, client_id, cmd_tx, shutdown, config).await? else {
        return Ok(());
    };
    framed.send(protocol::registered_welcome(&username)).await?;

    let mut deadline = next_deadline(config.read_timeout);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender means the actor is gone; treat both the
                // same as a shutdown.
                if changed.is_err() || *shutdown.borrow() {
                    let _ = framed.send(protocol::SQUIT_TOKEN).await;
                    break;
                }
            }
            line = framed.next() => {
                match line {
                    Some(Ok(line)) => {
                        deadline = next_deadline(config.read_timeout);
                        route_line(client_id, &line, framed, cmd_tx).await?;
                    }
                    Some(Err(err)) => {
                        warn!("Session {} read error: {}", client_id, err);
                        break;
                    }
                    None => break,
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(line) => framed.send(line).await?,
                    // Queue closed: the actor removed this user.
                    None => break,
                }
            }
            _ = idle(deadline) => {
                debug!("Session {} idle deadline reached", client_id);
                break;
            }
        }
    }

    Ok(())
}

/// Username handshake: prompt until a usable name is claimed
///
/// Returns `None` when the peer leaves, the server shuts down, the idle
/// deadline passes, or the actor stops answering; the caller then winds the
/// session down. Usernames fold ASCII case, the same fold channel names get.
async fn claim_username<S>(
    framed: &mut Framed<S, LinesCodec>,
    client_id: ClientId,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    shutdown: &mut watch::Receiver<bool>,
    config: &SessionConfig,
) -> Result<Option<String>, AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut deadline = next_deadline(config.read_timeout);

    loop {
        framed.send(protocol::USERNAME_PROMPT).await?;

        let line = tokio::select! {
            line = framed.next() => line,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = framed.send(protocol::SQUIT_TOKEN).await;
                    return Ok(None);
                }
                continue;
            }
            _ = idle(deadline) => {
                debug!("Session {} idle deadline reached during handshake", client_id);
                return Ok(None);
            }
        };

        let line = match line {
            Some(line) => line?,
            None => return Ok(None),
        };
        deadline = next_deadline(config.read_timeout);

        let username = line.trim().to_ascii_lowercase();
        if username.is_empty() {
            continue;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        cmd_tx
            .send(ServerCommand::Register {
                client_id,
                username: username.clone(),
                ack: ack_tx,
            })
            .await
            .map_err(|_| AppError::ChannelSend)?;

        match ack_rx.await {
            Ok(Registration::Accepted) => return Ok(Some(username)),
            Ok(Registration::NameTaken) => {
                framed.send(protocol::USERNAME_TAKEN).await?;
            }
            Err(_) => return Ok(None),
        }
    }
}

/// Interpret one inbound line and act on it
///
/// Usage errors are answered right here; everything else crosses over to
/// the actor.
async fn route_line<S>(
    client_id: ClientId,
    line: &str,
    framed: &mut Framed<S, LinesCodec>,
    cmd_tx: &mpsc::Sender<ServerCommand>,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match protocol::parse_line(line) {
        Input::Command(command) => cmd_tx
            .send(ServerCommand::Dispatch { client_id, command })
            .await
            .map_err(|_| AppError::ChannelSend)?,
        Input::Invalid(usage) => framed.send(usage).await?,
        Input::Chat(text) => cmd_tx
            .send(ServerCommand::Chat { client_id, text })
            .await
            .map_err(|_| AppError::ChannelSend)?,
    }
    Ok(())
}

fn next_deadline(read_timeout: Option<Duration>) -> Option<Instant> {
    read_timeout.map(|timeout| Instant::now() + timeout)
}

async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
