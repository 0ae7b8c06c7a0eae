//! Error classification for retry decisions.

use std::time::Duration;

/// Top-level error classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that should be retried with backoff.
    Retryable(RetryableError),

    /// Permanent errors that should NOT be retried.
    Permanent(PermanentError),

    /// Degraded state: the operation can proceed in a reduced mode.
    Degraded(DegradedError),
}

/// Transient errors (retry recommended).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryableError {
    #[error("document lock timed out after {waited_ms}ms")]
    LockTimeout { waited_ms: u64 },

    #[error("external command timed out")]
    CommandTimeout,

    #[error("external command failed transiently: exit {exit_code}")]
    TransientCommandFailure { exit_code: i32 },
}

/// Permanent errors (do NOT retry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermanentError {
    #[error("invalid input in field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Q-Gate findings remained after the re-entry cap")]
    QGateUnresolved,

    #[error("resource not found: {0}")]
    NotFound(String),
}

/// Degraded state (continue, but record the shortfall).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DegradedError {
    #[error("{passed}/{total} verification commands passed")]
    PartialVerification { passed: usize, total: usize },
}

/// Trait for error classification, implemented by [`crate::error::Error`]
/// and by any narrower per-component error type that wraps it.
pub trait RetryClassifiable {
    fn classify(&self) -> ErrorClass;

    fn is_retryable(&self) -> bool {
        matches!(self.classify(), ErrorClass::Retryable(_))
    }

    fn suggested_backoff(&self) -> Option<Duration>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_retryable() {
        let class = ErrorClass::Retryable(RetryableError::LockTimeout { waited_ms: 5000 });
        assert!(matches!(class, ErrorClass::Retryable(_)));
    }

    #[test]
    fn invariant_violation_is_permanent() {
        let class = ErrorClass::Permanent(PermanentError::InvariantViolation("x".into()));
        assert!(matches!(class, ErrorClass::Permanent(_)));
    }
}
