//! Error taxonomy for the dispatch layer
//!
//! Every failure the dispatcher can produce is recovered locally: it is
//! logged, surfaced as a status event where the operator should see it, and
//! returned as a value. Nothing here propagates as a panic.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Dispatch error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A bounded wait on the command port expired
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The machine reported a runtime error
    #[error("machine error {code}: {message}")]
    Machine {
        /// Runtime-assigned fault code.
        code: i32,
        /// The fault text as reported.
        message: String,
    },

    /// A request carried an argument that validation rejected before any
    /// command was issued
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected.
        reason: String,
    },

    /// A precondition for the request was not met (for example, jogging a
    /// powered-off machine)
    #[error("declined: {reason}")]
    Declined {
        /// The unmet precondition.
        reason: String,
    },

    /// Machine configuration could not be loaded or failed validation
    #[error("configuration error: {reason}")]
    Config {
        /// What was wrong with the configuration.
        reason: String,
    },
}

impl DispatchError {
    /// Invalid-argument error from a string reason
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Declined error from a string reason
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
        }
    }

    /// Configuration error from a string reason
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type using DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;
