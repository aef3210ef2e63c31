//! Error types for source adapters.
//!
//! Every variant renders as a message suitable for showing to a user as-is,
//! because it ends up in a failed job's `result.error`.

use thiserror::Error;

/// Errors that can occur while running a source adapter.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A mandatory credential is missing
    #[error("{provider} {credential} not configured")]
    Configuration {
        /// Provider name
        provider: &'static str,
        /// What is missing, e.g. "API key"
        credential: &'static str,
    },

    /// The provider answered with a non-success status
    #[error("{provider} API error: {status} {reason}")]
    Remote {
        /// Provider name
        provider: &'static str,
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        reason: String,
    },

    /// The provider could not be reached
    #[error("{provider} request failed: {cause}")]
    Transport {
        /// Provider name
        provider: &'static str,
        /// Underlying cause, including nested errors
        cause: String,
    },

    /// The target domain did not resolve
    #[error("could not resolve domain {domain}: {cause}")]
    Resolution {
        /// Domain that was looked up
        domain: String,
        /// Underlying cause
        cause: String,
    },

    /// The provider answered with something that is not the expected shape
    #[error("{provider} returned an unreadable response: {cause}")]
    Parse {
        /// Provider name
        provider: &'static str,
        /// Underlying cause
        cause: String,
    },

    /// A local script failed
    #[error("{0}")]
    Process(String),

    /// The settings provider failed
    #[error("failed to read settings: {0}")]
    Settings(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl SourceError {
    /// Whether this error means a credential is missing.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
