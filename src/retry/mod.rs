//! Retry logic with exponential backoff.
//!
//! This module provides error classification (retryable vs. permanent vs.
//! degraded), exponential backoff with jitter, and bounded retry limits. It
//! backs the lock-timeout retry in the artifact store and is available
//! to any caller that classifies its own errors via [`RetryClassifiable`].

pub mod classifier;
pub mod strategy;

pub use classifier::{ErrorClass, RetryClassifiable};
pub use strategy::{RetryConfig, execute_with_backoff, execute_with_backoff_sync};

/// Retry module result type.
pub type Result<T> = std::result::Result<T, RetryError>;

/// Retry error types.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("max retry attempts exceeded: {0}")]
    MaxAttemptsExceeded(usize),

    #[error("permanent error (not retryable): {0}")]
    PermanentError(String),
}
