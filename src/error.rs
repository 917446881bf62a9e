//! Error types for the teardown system.
//!
//! Per-stack failures never escape the orchestrator; they are folded into the
//! teardown report. The errors here surface from configuration loading, the
//! run lock, and the backend adapters (where the orchestrator catches them).

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the teardown system.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resource backend errors.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Run lock errors.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An environment override could not be interpreted.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvValue {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Errors reported by a resource backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The existence check could not be performed.
    #[error("Backend unavailable while checking {stack}: {message}")]
    Unavailable {
        /// Stack being checked.
        stack: String,
        /// Description of the failure.
        message: String,
    },

    /// The backend rejected the deletion request.
    #[error("Deletion request for {stack} was rejected: {cause}")]
    DeletionRequestFailed {
        /// Stack whose deletion was requested.
        stack: String,
        /// Cause reported by the backend.
        cause: String,
    },

    /// The backend reports that an accepted deletion ended in a failed state.
    #[error("Deletion of {stack} failed: {reason}")]
    DeletionFailed {
        /// Stack that failed to delete.
        stack: String,
        /// Reason reported by the backend.
        reason: String,
    },
}

/// Run lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock.
    #[error("Teardown is locked by another run (lock holder: {holder}, since: {since})")]
    HeldByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// The lock file could not be read or written.
    #[error("Lock file IO failed: {message}")]
    Io {
        /// Description of the IO failure.
        message: String,
    },

    /// The lock file exists but cannot be parsed.
    #[error("Lock file is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

/// Result type alias for teardown operations.
pub type Result<T> = std::result::Result<T, TeardownError>;

impl TeardownError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is a transient backend failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Unavailable { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl BackendError {
    /// Creates an unavailable error for a stack.
    #[must_use]
    pub fn unavailable(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            stack: stack.into(),
            message: message.into(),
        }
    }

    /// Creates a rejected-deletion error for a stack.
    #[must_use]
    pub fn deletion_rejected(stack: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::DeletionRequestFailed {
            stack: stack.into(),
            cause: cause.into(),
        }
    }
}

impl LockError {
    /// Creates a lock IO error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_transient() {
        let err = TeardownError::from(BackendError::unavailable("api", "throttled"));
        assert!(err.is_transient());

        let err = TeardownError::from(BackendError::deletion_rejected("api", "access denied"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_messages_name_the_stack() {
        let err = TeardownError::from(BackendError::DeletionFailed {
            stack: String::from("prod-edge"),
            reason: String::from("bucket not empty"),
        });
        let message = err.to_string();
        assert!(message.contains("prod-edge"));
        assert!(message.contains("bucket not empty"));
    }
}
