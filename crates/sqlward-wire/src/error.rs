//! Wire-level error types.

use std::io;

use thiserror::Error;

use crate::envelope::{CODE_UNKNOWN_SERVICE, CODE_UNKNOWN_SESSION};

/// Errors raised while talking to a plugin over its wire connection.
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame arrived without a Content-Length header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// A frame header could not be parsed.
    #[error("invalid frame header")]
    InvalidHeader,

    /// A message could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The handshake exchange failed before any service call.
    #[error("handshake failed: {message}")]
    Handshake {
        /// Description of the mismatch.
        message: String,
    },

    /// The plugin answered a call with a failure.
    #[error("plugin returned error: {message} (code: {code})")]
    Remote {
        /// Protocol error code.
        code: i64,
        /// Error message from the plugin.
        message: String,
    },

    /// No response arrived within the call deadline.
    #[error("call timed out after {timeout_secs}s")]
    Timeout {
        /// The deadline that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// The connection's reader is gone; the plugin process closed its end.
    #[error("connection closed by plugin")]
    ConnectionClosed,
}

impl WireError {
    /// Returns `true` when the failure says the addressed service does not
    /// exist on the plugin. V1 capability probing branches on this.
    #[must_use]
    pub const fn is_unknown_service(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                code: CODE_UNKNOWN_SERVICE,
                ..
            }
        )
    }

    /// Returns `true` when the failure says the session id is not known to
    /// the plugin, e.g. after the plugin process was replaced.
    #[must_use]
    pub const fn is_unknown_session(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                code: CODE_UNKNOWN_SESSION,
                ..
            }
        )
    }
}
