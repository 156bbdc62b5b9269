//! Backend failures.
//!
//! Drivers map their internal errors into these variants so callers can tell
//! a lost compare-and-swap from a missing record or a flaky connection.

use std::time::Duration;

/// Failure reported by a [`KvBackend`](crate::KvBackend), [`PlanRepo`](crate::PlanRepo),
/// [`ResourceClient`](crate::ResourceClient) or [`ImageRegistry`](crate::ImageRegistry).
#[derive(Debug, thiserror::Error)]
pub enum PortsError {
    /// Nothing stored under that id.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (e.g. "plan", "ClusterRole").
        entity: String,
        /// Requested id.
        id: String,
    },

    /// Optimistic concurrency conflict: the stored version moved on.
    #[error("{entity} {id}: expected version {expected_version}, got {actual_version}")]
    Conflict {
        /// Kind of entity.
        entity: String,
        /// Id of the record written.
        id: String,
        /// Version the write was based on.
        expected_version: u64,
        /// Version found in the store.
        actual_version: u64,
    },

    /// Create of an entity that already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of entity.
        entity: String,
        /// Identifier of the existing entity.
        id: String,
    },

    /// The backend does not handle this kind of request.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Gave up waiting, e.g. for a lock file.
    #[error("timeout: {operation} after {duration:?}")]
    Timeout {
        /// What was being waited for.
        operation: String,
        /// Time spent waiting.
        duration: Duration,
    },

    /// Anything else, typically local I/O.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortsError {
    /// Shorthand for [`PortsError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for [`PortsError::Conflict`].
    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        expected: u64,
        actual: u64,
    ) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.into(),
            expected_version: expected,
            actual_version: actual,
        }
    }

    /// Shorthand for [`PortsError::AlreadyExists`].
    pub fn already_exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for [`PortsError::Timeout`].
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Connection failures and timeouts may succeed on a later attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }

    /// Returns `true` for [`PortsError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`PortsError::AlreadyExists`].
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

impl From<serde_json::Error> for PortsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PortsError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Self::Timeout {
                operation: "io".to_owned(),
                duration: Duration::ZERO,
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}
