use std::net::SocketAddr;

use thiserror::Error;

/// A malformed inbound line.  Logged and dropped; never fatal.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` {reason}")]
    BadField { field: &'static str, reason: String },

    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address `{0}`")]
    BadAddress(String),

    #[error("I/O error on {addr}: {source}")]
    Io {
        addr:   SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("controller did not reconnect within {waited_ms} ms")]
    ControllerLost { waited_ms: u64 },

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
