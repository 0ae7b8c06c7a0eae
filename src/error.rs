//! Crate-wide error taxonomy.
//!
//! Every component returns this enum (or a narrower local error that
//! converts into it at the component's public boundary) so that the
//! dispatcher has one shape to translate into a structured outcome and a
//! process exit code.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::retry::classifier::{
    DegradedError, ErrorClass, PermanentError, RetryClassifiable, RetryableError,
};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameters failed schema validation; returned to the caller without
    /// ever entering the lifecycle.
    #[error("invalid input in {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// A named entity (plan, task, deliverable, ...) is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create-style operation targeted an entity that already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An artifact write would violate a declared invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A document lock could not be acquired before its timeout.
    #[error("lock timed out on {document} after {waited_ms}ms")]
    LockTimeout { document: String, waited_ms: u64 },

    /// An external command completed with a failing exit status.
    #[error("external command `{command}` failed: exit {exit_code}")]
    ExternalCommandFailed { command: String, exit_code: i32 },

    /// An external command exceeded its deadline and was killed.
    #[error("external command `{command}` timed out after {timeout_seconds}s")]
    Timeout {
        command: String,
        timeout_seconds: u64,
    },

    /// Findings remained on a Q-Gate phase after the re-entry cap was hit.
    #[error("Q-Gate on phase {phase} has {pending_findings} unresolved finding(s) after {attempts} re-entries")]
    QGateUnresolved {
        phase: String,
        pending_findings: usize,
        attempts: u32,
    },

    /// A user-edited artifact (or shared config) fails its declared schema.
    /// Unlike `InvariantViolation`, this halts the phase rather than
    /// recovering via Q-Gate re-entry.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {what}: {source}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl RetryClassifiable for Error {
    fn classify(&self) -> ErrorClass {
        match self {
            Error::LockTimeout { waited_ms, .. } => {
                ErrorClass::Retryable(RetryableError::LockTimeout {
                    waited_ms: *waited_ms,
                })
            }

            Error::Timeout { .. } => ErrorClass::Retryable(RetryableError::CommandTimeout),

            Error::ExternalCommandFailed { exit_code, .. } => {
                // Exit codes >= 128 conventionally indicate the process was
                // killed by a signal (e.g. 137 = SIGKILL) rather than a
                // deliberate non-zero return — worth one retry.
                if *exit_code >= 128 {
                    ErrorClass::Retryable(RetryableError::TransientCommandFailure {
                        exit_code: *exit_code,
                    })
                } else {
                    ErrorClass::Permanent(PermanentError::InvalidInput {
                        field: "command".to_string(),
                        reason: self.to_string(),
                    })
                }
            }

            Error::InvalidInput { field, reason } => {
                ErrorClass::Permanent(PermanentError::InvalidInput {
                    field: field.clone(),
                    reason: reason.clone(),
                })
            }

            Error::NotFound(what) => ErrorClass::Permanent(PermanentError::NotFound(what.clone())),

            Error::InvariantViolation(detail) => {
                ErrorClass::Permanent(PermanentError::InvariantViolation(detail.clone()))
            }

            Error::QGateUnresolved { .. } => {
                ErrorClass::Permanent(PermanentError::QGateUnresolved)
            }

            Error::SchemaViolation(detail) => {
                ErrorClass::Permanent(PermanentError::InvariantViolation(detail.clone()))
            }

            Error::AlreadyExists(_) => ErrorClass::Permanent(PermanentError::InvalidInput {
                field: "id".to_string(),
                reason: self.to_string(),
            }),

            Error::Io { source, .. } => classify_io_error(source),

            Error::Serialization { .. } => ErrorClass::Permanent(PermanentError::InvalidInput {
                field: "document".to_string(),
                reason: self.to_string(),
            }),

            Error::Other(msg) => classify_generic_message(msg),
        }
    }

    fn suggested_backoff(&self) -> Option<Duration> {
        match self.classify() {
            ErrorClass::Retryable(RetryableError::LockTimeout { .. }) => {
                Some(Duration::from_millis(200))
            }
            ErrorClass::Retryable(_) => None,
            ErrorClass::Permanent(_) => None,
            ErrorClass::Degraded(DegradedError::PartialVerification { .. }) => {
                Some(Duration::from_secs(1))
            }
        }
    }
}

fn classify_io_error(err: &std::io::Error) -> ErrorClass {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
            ErrorClass::Retryable(RetryableError::CommandTimeout)
        }
        ErrorKind::NotFound => ErrorClass::Permanent(PermanentError::NotFound(err.to_string())),
        ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::InvalidData => {
            ErrorClass::Permanent(PermanentError::InvalidInput {
                field: "io".to_string(),
                reason: err.to_string(),
            })
        }
        _ => ErrorClass::Retryable(RetryableError::TransientCommandFailure { exit_code: -1 }),
    }
}

fn classify_generic_message(msg: &str) -> ErrorClass {
    let lower = msg.to_lowercase();
    if lower.contains("lock") || lower.contains("busy") {
        ErrorClass::Retryable(RetryableError::LockTimeout { waited_ms: 0 })
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorClass::Retryable(RetryableError::CommandTimeout)
    } else {
        ErrorClass::Permanent(PermanentError::InvalidInput {
            field: "input".to_string(),
            reason: msg.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_classifies_as_retryable_with_backoff() {
        let err = Error::LockTimeout {
            document: "status.toon".into(),
            waited_ms: 5000,
        };
        assert!(err.is_retryable());
        assert!(err.suggested_backoff().is_some());
    }

    #[test]
    fn invariant_violation_is_permanent() {
        let err = Error::InvariantViolation("asymmetric affected_files".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn signal_kill_exit_code_is_retried_once() {
        let err = Error::ExternalCommandFailed {
            command: "mvn verify".into(),
            exit_code: 137,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn ordinary_nonzero_exit_is_permanent() {
        let err = Error::ExternalCommandFailed {
            command: "mvn verify".into(),
            exit_code: 1,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn qgate_unresolved_is_permanent() {
        let err = Error::QGateUnresolved {
            phase: "3-outline".into(),
            pending_findings: 2,
            attempts: 5,
        };
        assert!(!err.is_retryable());
    }
}
