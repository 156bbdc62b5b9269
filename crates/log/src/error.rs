//! Logger errors.

/// Errors raised while installing or reconfiguring the logger.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The filter directive did not parse.
    #[error("invalid log filter {0}")]
    Filter(String),

    /// The format name is not one of `compact`, `pretty` or `json`.
    #[error("unknown log format: {0}")]
    Format(String),

    /// A global subscriber is already installed.
    #[error("logger already initialized")]
    AlreadyInitialized,

    /// The subscriber rejected a filter reload.
    #[error("failed to reload log filter: {0}")]
    Reload(String),
}

/// Result alias for logger operations.
pub type LogResult<T> = Result<T, LogError>;
