//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for entitlement synchronization
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum EntsyncError {
    /// Bad or missing configuration or credential material.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input row.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection-level failure (DNS, refused, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote API rejected a freshly issued credential.
    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    /// Any status outside the decoded set.
    #[error("Remote call failed with status {status}: {body}")]
    RemoteCall { status: u16, body: String },

    /// Malformed or non-terminating listing response.
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Operation not offered by the selected network.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Input or report file failure.
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EntsyncError {
    /// Whether this error stops the whole run rather than a single row.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_) | Self::Io(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteCall { status, .. } => Some(*status),
            Self::AuthExpired(_) => Some(401),
            _ => None,
        }
    }
}

/// Result type alias for entitlement synchronization operations
pub type Result<T> = std::result::Result<T, EntsyncError>;
