//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// A rate limit denial is not an error; it is reported through
/// [`Decision::allowed`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// A policy with a zero limit or zero window was supplied.
    #[error("Invalid rate limit policy: limit={limit}, window_seconds={window_seconds}")]
    InvalidPolicy { limit: u64, window_seconds: u64 },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
