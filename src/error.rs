//! Error types for cloud-ratelimit.

use thiserror::Error;

use crate::context::ContextError;

/// Errors produced while parsing a rate limiter specification string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    /// Fewer than two comma separated fields.
    #[error("must at least specify operation and rate limiter type: {spec:?}")]
    MissingFields { spec: String },

    /// The key part is not `[version].[service].[operation]`.
    #[error("must specify rate limit in [version].[service].[operation] format: {key:?}")]
    InvalidKey { key: String },

    /// The limiter type tag is not recognized.
    #[error("invalid rate limiter type provided: {kind:?}")]
    UnsupportedType { kind: String },

    /// Wrong number of parameters for the limiter type.
    #[error("invalid number of args for rate limiter type {kind}: expected {expected}, got {got}")]
    InvalidArgCount {
        kind: String,
        expected: usize,
        got: usize,
    },

    /// The rate is not a float or not greater than 0.
    #[error("invalid argument for rate limiter type {kind}: {value:?} is not a float or not greater than 0")]
    InvalidRate { kind: String, value: String },

    /// The burst is not an integer.
    #[error("invalid argument for rate limiter type {kind}: expected {value:?} to be an int")]
    InvalidBurst { kind: String, value: String },
}

/// Main error type for cloud-ratelimit operations.
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// Malformed rate limiter specification
    #[error("Configuration error: {0}")]
    Config(#[from] SpecError),

    /// The call context was cancelled before a token was obtained
    #[error("context canceled")]
    Cancelled,

    /// The call context deadline passed before a token was obtained
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Token acquisition failed
    #[error("Rate limit error: {0}")]
    RateLimit(String),

    /// Service settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Configuration file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RateLimitError {
    /// Whether this error came from the caller's context ending.
    pub fn is_context_error(&self) -> bool {
        matches!(self, RateLimitError::Cancelled | RateLimitError::DeadlineExceeded)
    }
}

impl From<ContextError> for RateLimitError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => RateLimitError::Cancelled,
            ContextError::DeadlineExceeded => RateLimitError::DeadlineExceeded,
        }
    }
}

/// Result type alias for cloud-ratelimit operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;
