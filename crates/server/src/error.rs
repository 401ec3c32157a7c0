//! Error types for the curl-mcp server.

use thiserror::Error;

/// Main error type for the server front ends.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (bad flags or environment values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (transport failed to start)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Runtime errors (transport failed while serving)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
