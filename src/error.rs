//! Error types for the Tollgate service.

use thiserror::Error;

/// Main error type for Tollgate operations.
///
/// Only configuration loading and server startup produce errors. Per-request
/// admission decisions are plain data (see [`crate::ratelimit::RateLimitResult`]).
#[derive(Error, Debug)]
pub enum TollgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A route policy failed validation
    #[error("Invalid policy for route '{pattern}': {reason}")]
    InvalidPolicy { pattern: String, reason: String },

    /// Layered settings could not be read or deserialized
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
