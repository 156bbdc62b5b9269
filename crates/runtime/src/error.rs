//! Runtime error types.

use gantry_core::{ActionKind, ResourceKind};
use gantry_ports::PortsError;

/// Registry lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// No handler is registered for the action kind.
    #[error("unknown action: {0}")]
    UnknownAction(ActionKind),

    /// No upsert handler is registered for the resource kind.
    #[error("unsupported resource kind: {0}")]
    UnsupportedResource(ResourceKind),
}

/// Error returned by a phase handler's `execute` or `rollback`.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A failure that may succeed on retry.
    #[error("{0}")]
    Transient(String),

    /// A failure that retrying cannot fix; remaining attempts are skipped.
    #[error("fatal: {0}")]
    Fatal(String),

    /// The phase payload does not match what the handler expects.
    #[error("invalid phase data: {0}")]
    InvalidData(String),

    /// The call observed the cancellation signal and stopped.
    #[error("cancelled")]
    Cancelled,

    /// A capability (cluster API, registry, store) failed.
    #[error(transparent)]
    Capability(#[from] PortsError),
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Transient`].
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Convenience constructor for [`HandlerError::Fatal`].
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Whether the engine should spend another attempt on this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Fatal(_) | Self::InvalidData(_) | Self::Cancelled => false,
            Self::Capability(err) => !matches!(
                err,
                PortsError::Unsupported(_) | PortsError::Serialization(_)
            ),
        }
    }
}

impl From<RuntimeError> for HandlerError {
    fn from(err: RuntimeError) -> Self {
        Self::Fatal(err.to_string())
    }
}
