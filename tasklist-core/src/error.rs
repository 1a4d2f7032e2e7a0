//! Error taxonomy for the synchronization layer.

use thiserror::Error;

use crate::entities::TodoId;

/// Every failure the remote client, the cache and the mutation coordinator
/// can report.
///
/// `Clone` because a single coalesced fetch delivers its result to every
/// reader waiting on the same key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Transport failure or timeout; no response was received.
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// Non-2xx response, or a 2xx response whose body could not be decoded.
    #[error("Server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    /// The server does not know the todo being updated.
    #[error("Todo not found: {id}")]
    NotFound { id: TodoId },

    /// Input rejected locally before any request was made.
    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Programming or setup error, e.g. reading a key with no fetcher.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

/// Discriminant of [`SyncError`], used to pick user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Server,
    NotFound,
    Validation,
    Configuration,
}

impl SyncError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn server(status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::Server,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Whether repeating the same call later could succeed.
    ///
    /// Validation and configuration errors need different input or code.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Server { .. })
    }
}

/// Result type alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = SyncError::NotFound { id: 42 };
        assert_eq!(err.to_string(), "Todo not found: 42");
    }

    #[test]
    fn test_error_display_server() {
        let err = SyncError::server(500, "boom");
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(SyncError::network("reset").kind(), ErrorKind::Network);
        assert_eq!(SyncError::server(502, "").kind(), ErrorKind::Server);
        assert_eq!(SyncError::NotFound { id: 1 }.kind(), ErrorKind::NotFound);
        assert_eq!(
            SyncError::validation("title", "empty").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            SyncError::configuration("no fetcher").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(SyncError::network("timeout").is_transient());
        assert!(SyncError::server(503, "").is_transient());
        assert!(!SyncError::validation("title", "empty").is_transient());
        assert!(!SyncError::NotFound { id: 3 }.is_transient());
    }
}
