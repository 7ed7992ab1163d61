//! Error types for dnsync
//!
//! This module defines all error types used throughout the crate.
//!
//! The variants follow the reconciliation taxonomy:
//! - configuration errors are fatal at construction and never retried
//! - soft errors are reported per record and never abort a batch
//! - everything else is a hard error that aborts the current call

use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dnsync
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing endpoint, malformed domain filter, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record shape the backend cannot represent
    #[error("Unsupported record: {0}")]
    Soft(String),

    /// The backend kept answering 401 after the session was renewed
    #[error("max tries reached for token renewal ({attempts} attempts)")]
    TokenRenewalExhausted {
        /// Renewal rounds spent before giving up
        attempts: usize,
    },

    /// Non-success response carrying the backend's error envelope
    #[error("received {status} status code from request: [{key}] {message} ({hint})")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Backend error key
        key: String,
        /// Backend error message
        message: String,
        /// Backend hint, often empty
        hint: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a soft (per-record) error
    pub fn soft(msg: impl Into<String>) -> Self {
        Self::Soft(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error only affects a single record
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Soft(_))
    }

    /// HTTP status carried by a backend error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}
