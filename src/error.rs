//! Error types for the Turnstile rate limiter.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// A denied acquisition is not an error; it is reported through
/// [`Decision`](crate::ratelimit::Decision).
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// A preset was referenced that the registry does not contain
    #[error("Unknown rate limit preset: {name}")]
    UnknownPreset { name: String },

    /// Malformed call arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TurnstileError {
    /// Whether this error points at a configuration bug rather than a bad call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnknownPreset { .. } | Self::Config(_))
    }
}

impl From<config::ConfigError> for TurnstileError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
