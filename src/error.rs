//! Error types for the chat server
//!
//! Defines application-level errors and per-recipient delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers fatal startup errors (bind/listen), per-connection transport
/// errors, and internal channel failures. Per-command validation problems
/// are not errors: they are ordinary reply strings.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (socket setup or connection transport)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (over-long line or invalid UTF-8 on receive)
    #[error("framing error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// Configuration file parse error
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid startup configuration (bad host, unresolvable address)
    #[error("configuration error: {0}")]
    Config(String),

    /// Channel send error (fatal - the server actor is gone)
    #[error("server channel closed")]
    ChannelSend,
}

/// Per-recipient delivery errors
///
/// Produced by the non-blocking send to one user's outbound queue. Delivery
/// is best-effort: callers log these and move on.
#[derive(Debug, Error)]
pub enum SendError {
    /// The recipient's outbound queue is full
    #[error("outbound queue full")]
    Full,

    /// The recipient's session has gone away
    #[error("outbound queue closed")]
    Closed,
}
