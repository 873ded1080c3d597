//! Multi-User TCP Chat Server Library
//!
//! A line-oriented chat server built with tokio, using the Actor pattern
//! for state management. Clients talk plain newline-terminated UTF-8 over
//! TCP; `/`-prefixed lines are commands and everything else is chat for the
//! user's current channel.
//!
//! # Features
//! - Username handshake with uniqueness check
//! - Named channels, created on first join
//! - Channel-wide broadcast with sender prefix
//! - IRC-flavored commands (/JOIN, /LIST, /NICK, /KILL, /ISON, ...)
//! - Operator shutdown via /DIE or Ctrl-C, announced with `/squit`
//! - Optional idle timeout per connection
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning all registries
//! - Each connection runs a `session` task communicating with the actor
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::sync::{mpsc, watch};
//! use chatterd::{acceptor, ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = acceptor::bind(&config).await.unwrap();
//!
//!     let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!     tokio::spawn(ChatServer::new(cmd_rx, shutdown_tx).run());
//!
//!     acceptor::run(listener, &config, cmd_tx, shutdown_rx).await;
//! }
//! ```

pub mod acceptor;
pub mod channel;
pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use channel::Channel;
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use protocol::{Command, Input};
pub use server::{ChatServer, Registration, ServerCommand};
pub use session::{run_session, SessionConfig};
pub use types::{ChannelName, ClientId};
pub use user::{User, UserStatus, UserType};
