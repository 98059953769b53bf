//! Error types for the auth crate.

use thiserror::Error;

/// Errors that can occur in authorization store operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator lookup failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Failure of a membership or rule lookup against a backing store.
///
/// Absence of data is never an error; lookups return empty results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The lookup did not complete within the store's own bounds.
    #[error("{lookup} lookup timed out after {elapsed_ms}ms")]
    Timeout {
        /// Which lookup timed out (e.g. "membership").
        lookup: &'static str,
        /// How long the store waited before giving up.
        elapsed_ms: u64,
    },
}

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
