//! Error types for the access crate.

use gitward_auth::LookupError;
use thiserror::Error;

/// Result type alias for access checks.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Broad category of a denial, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Project missing or invisible to the actor.
    NotFound,
    /// Operation refused.
    Forbidden,
    /// Project reached through an old path.
    ProjectMoved,
    /// A collaborator lookup exceeded its bounds.
    Timeout,
}

/// Terminal failure of a Git access check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The project does not exist or the actor cannot see it.
    #[error("{0}")]
    NotFound(String),

    /// The operation is not permitted.
    #[error("{0}")]
    Forbidden(String),

    /// The project was renamed or transferred.
    #[error("{message}")]
    ProjectMoved {
        /// Path the client used.
        old_path: String,
        /// Current path of the project.
        new_path: String,
        /// Guidance for updating the remote.
        message: String,
    },

    /// A membership or rule lookup timed out.
    #[error("{0}")]
    Timeout(String),
}

impl AccessError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::Forbidden(_) => ErrorKind::Forbidden,
            AccessError::ProjectMoved { .. } => ErrorKind::ProjectMoved,
            AccessError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::NotFound(_) => 404,
            AccessError::Forbidden(_) => 403,
            AccessError::ProjectMoved { .. } => 300,
            AccessError::Timeout(_) => 503,
        }
    }

    /// The bare message, without client prefix.
    pub fn message(&self) -> &str {
        match self {
            AccessError::NotFound(message)
            | AccessError::Forbidden(message)
            | AccessError::Timeout(message) => message,
            AccessError::ProjectMoved { message, .. } => message,
        }
    }

    /// The message as shown by Git clients, each line prefixed.
    ///
    /// An empty prefix leaves the message untouched.
    pub fn client_message(&self, prefix: &str) -> String {
        prefix_lines(self.message(), prefix)
    }
}

impl From<LookupError> for AccessError {
    fn from(err: LookupError) -> Self {
        AccessError::Timeout(err.to_string())
    }
}

/// Prefix every line of `message` with `"{prefix}: "`.
pub fn prefix_lines(message: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return message.to_string();
    }
    message
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                format!("{prefix}:")
            } else {
                format!("{prefix}: {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A receive-pack hook line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeParseError {
    /// The line does not have three space-separated fields.
    #[error("malformed change line: expected '<oldrev> <newrev> <ref>', got {0:?}")]
    Malformed(String),

    /// A revision is not a hex object ID.
    #[error("invalid revision {0:?}")]
    InvalidRevision(String),

    /// The ref name is not a valid Git ref.
    #[error("invalid ref name {0:?}")]
    InvalidRef(String),
}

/// Failure to load [`crate::AccessConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config sources could not be read or deserialized.
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AccessError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AccessError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(AccessError::Timeout("x".into()).status_code(), 503);
        assert_eq!(
            AccessError::ProjectMoved {
                old_path: "a".into(),
                new_path: "b".into(),
                message: "moved".into(),
            }
            .status_code(),
            300
        );
    }

    #[test]
    fn test_client_message_prefixes_every_line() {
        let err = AccessError::Timeout("Push operation timed out\n\nRunning checks".into());
        assert_eq!(
            err.client_message("GitLab"),
            "GitLab: Push operation timed out\nGitLab:\nGitLab: Running checks"
        );
        assert_eq!(err.client_message(""), err.message());
    }

    #[test]
    fn test_lookup_timeout_converts() {
        let err: AccessError = LookupError::Timeout {
            lookup: "membership",
            elapsed_ms: 250,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.message().contains("membership lookup timed out"));
    }
}
