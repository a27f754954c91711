//! Error types for skosnav operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used across
//! all skosnav crates. Uses `thiserror` for derive macros.
//!
//! The variants follow the failure taxonomy of the engine: transport failures,
//! timeouts, malformed results and cancellation. Logical emptiness (a query
//! that matches nothing) is never an error.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in skosnav operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure talking to the endpoint.
    #[error("Transport error: {message}")]
    Transport {
        /// What was being attempted.
        message: String,
        /// Underlying cause, when one is available.
        #[source]
        source: Option<BoxError>,
    },

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// A query did not complete within its time budget.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint returned rows that could not be parsed.
    #[error("Malformed result: {0}")]
    MalformedResult(String),

    /// The active discovery scope changed while the operation was running.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a transport error without an underlying cause.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping an underlying cause.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a malformed-result error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResult(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Wrap an I/O error with the path it concerned.
    pub fn io_with_path(err: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {err}", path.as_ref().display()),
        ))
    }

    /// True for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// True for network and HTTP-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Http { .. })
    }

    /// True for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether an opt-in retry layer may re-issue the query.
    ///
    /// Client errors (4xx other than 429) and malformed results are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using skosnav's Error type.
pub type Result<T> = std::result::Result<T, Error>;
