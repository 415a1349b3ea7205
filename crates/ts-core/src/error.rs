//! Framework error type.
//!
//! Sub-crates define their own error enums; `ts-sim` wraps them all.  The
//! variants here cover configuration loading, which is always a setup error.

use thiserror::Error;

/// The error type for `ts-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration value `{field}`: {reason}")]
    InvalidConfig {
        field:  &'static str,
        reason: String,
    },

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidConfig { field, reason: reason.into() }
    }
}

/// Shorthand result type for `ts-core`.
pub type CoreResult<T> = Result<T, CoreError>;
