//! Error types for the citycare engine.
//!
//! Every core operation returns either a success value or exactly one classified
//! [`CoreError`]. The calling layer decides how to present each kind; only
//! [`CoreError::StorageUnavailable`] is worth retrying.

use thiserror::Error;

use crate::models::{Operation, Status};

/// Errors that can occur in the complaint engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required field is missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown complaint or worker
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested transition is absent from the state table
    #[error("Illegal transition: cannot {operation} a {from} complaint")]
    IllegalTransition {
        /// Status the complaint was in when the operation was attempted
        from: Status,
        /// The operation that was refused
        operation: Operation,
    },

    /// A concurrent mutation on the same complaint won the race
    #[error("Conflict: complaint {0} was modified concurrently")]
    Conflict(String),

    /// A collaborator (blob store, worker directory, journal) is unreachable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The acting user's role does not allow the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Too many reports from the same user at the same spot
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a [`CoreError`], used by callers to map responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed input
    Validation,
    /// Unknown identifier
    NotFound,
    /// Transition not allowed from the current status
    IllegalTransition,
    /// Lost a concurrent race
    Conflict,
    /// Collaborator unavailable
    StorageUnavailable,
    /// Actor not permitted
    Forbidden,
    /// Spam guard tripped
    RateLimited,
    /// Bad configuration
    Config,
}

impl ErrorKind {
    /// Stable label used for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::IllegalTransition => "illegal_transition",
            Self::Conflict => "conflict",
            Self::StorageUnavailable => "storage_unavailable",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Config => "config",
        }
    }
}

impl CoreError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the caller may safely retry the whole request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Convenience type alias for Result with CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<sled::Error> for CoreError {
    fn from(err: sled::Error) -> Self {
        Self::StorageUnavailable(format!("journal: {err}"))
    }
}

impl From<bincode::Error> for CoreError {
    fn from(err: bincode::Error) -> Self {
        Self::StorageUnavailable(format!("journal encoding: {err}"))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}
