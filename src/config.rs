//! Server startup configuration
//!
//! Everything the listener and the sessions need at startup, collected into
//! one struct: bind address, backlog, reuse-address flag, the accept-loop
//! poll timeout, the optional session idle deadline, and channel capacities.
//! Loadable from a JSON file with every field defaulted.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 50000;
const DEFAULT_BACKLOG: u32 = 15;
const DEFAULT_ACCEPT_POLL_SECS: u64 = 3;
const DEFAULT_COMMAND_BUFFER: usize = 256;
const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Listening and session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind the listening socket to
    pub host: String,
    /// TCP port to listen on
    pub port: u16,
    /// Maximum number of pending connections on the listening socket
    pub backlog: u32,
    /// Whether to set SO_REUSEADDR before binding
    pub reuse_addr: bool,
    /// How long a single accept attempt may block before the shutdown flag
    /// is re-checked
    pub accept_poll_secs: u64,
    /// Idle read deadline for sessions, in seconds; absent disables it and a
    /// silent peer may stay connected indefinitely
    pub read_timeout_secs: Option<u64>,
    /// Capacity of the command channel (sessions to server actor)
    pub command_buffer: usize,
    /// Capacity of each session's outbound line queue
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            reuse_addr: true,
            accept_poll_secs: DEFAULT_ACCEPT_POLL_SECS,
            read_timeout_secs: None,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional JSON file
    ///
    /// With no path, returns the defaults. Unknown fields in the file are
    /// rejected so a typo does not silently fall back to a default.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&raw)?)
            }
        }
    }

    /// The `host:port` string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Accept-loop poll timeout as a `Duration`
    pub fn accept_poll(&self) -> Duration {
        Duration::from_secs(self.accept_poll_secs)
    }

    /// Session idle read deadline, if one is configured
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}
