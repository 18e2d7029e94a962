//! Error types shared by every provisioning target.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The target could not be reached, or the connection dropped.
    ConnectionFailed,
    /// The bootstrap principal lacks the privilege for the operation.
    PermissionDenied,
    /// The entity exists with attributes other than the declared ones.
    ConflictingDefinition,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ConflictingDefinition => "conflicting_definition",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a [`Connector`](crate::connector::Connector) or
/// [`Session`](crate::connector::Session) operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProvisionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProvisionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a connection failure
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Create a conflicting definition error
    pub fn conflicting_definition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConflictingDefinition, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

/// Reasons a provisioning spec is rejected before any connection is made.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("failed to read spec file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed spec: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("action #{index}: {message}")]
    Invalid { index: usize, message: String },
}

impl SpecError {
    pub fn invalid(index: usize, message: impl Into<String>) -> Self {
        Self::Invalid {
            index,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_error_display_includes_kind() {
        let error = ProvisionError::permission_denied("not authorized on admin");
        assert_eq!(
            error.to_string(),
            "permission_denied: not authorized on admin"
        );
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ConflictingDefinition).unwrap();
        assert_eq!(json, "\"conflicting_definition\"");
    }

    #[test]
    fn invalid_spec_error_names_action_index() {
        let error = SpecError::invalid(2, "collection name must not be empty");
        assert_eq!(
            error.to_string(),
            "action #2: collection name must not be empty"
        );
    }
}
