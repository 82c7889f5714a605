//! Error types for the report client engine.
//!
//! The primary error type is `EngineError`. Front ends convert it to a
//! user-facing message at their boundary; nothing in the engine treats an
//! error as fatal to the process.

use std::path::PathBuf;

use crate::session::JobPhase;

/// Errors raised by backend calls, artifact handling, configuration and
/// session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, bad JSON).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend answered `success: false`.
    #[error("{message}")]
    Backend { message: String },

    /// The report payload is not valid base64.
    #[error("Failed to decode report payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Writing the artifact to disk failed.
    #[error("Failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The suggested filename has no usable final component.
    #[error("Invalid filename: {name:?}")]
    InvalidFilename { name: String },

    /// Report parameters failed validation.
    #[error("Invalid report parameters: {reason}")]
    InvalidParams { reason: String },

    /// A job session transition not allowed by the lifecycle.
    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobPhase, to: JobPhase },

    /// A configuration value could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
}

impl EngineError {
    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
