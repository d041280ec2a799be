//! Error types for the publisher
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for publisher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the publisher
///
/// The reconciler classifies errors into three behavioral groups:
///
/// - **Fatal** ([`Error::Config`], [`Error::Auth`]): abort the entire run
///   before any mutation is issued.
/// - **Transient** ([`Error::Transient`]): retried with exponential backoff
///   up to the configured bound, then recorded in the run report.
/// - **Everything else**: recorded immediately in the run report without
///   retrying; the rest of the run continues.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal, pre-flight)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failures from the provider API (fatal, pre-flight)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transient network failures: timeouts, connection resets, 5xx, 429
    #[error("Transient network error: {0}")]
    Transient(String),

    /// The provider rejected the operation (e.g. invalid record value)
    #[error("Provider rejected operation: {0}")]
    Rejected(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a transient network error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a provider-rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
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

    /// Whether a failed operation may be retried with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether this error aborts the whole run before any mutation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Auth(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(Error::transient("timeout").is_transient());
        assert!(!Error::rejected("bad value").is_transient());
        assert!(!Error::auth("bad token").is_transient());
    }

    #[test]
    fn fatal_errors_abort_the_run() {
        assert!(Error::config("missing zone").is_fatal());
        assert!(Error::auth("401").is_fatal());
        assert!(!Error::transient("timeout").is_fatal());
        assert!(!Error::rejected("bad value").is_fatal());
    }
}
