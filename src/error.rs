//! Error types and result handling
//!
//! Defines all error types that can occur in the logging engine.
//! Uses thiserror for ergonomic error handling.

use std::io;
use thiserror::Error;

/// Result type alias using LogmillError
pub type Result<T> = std::result::Result<T, LogmillError>;

/// Main error type for the logging engine.
///
/// Configuration errors surface to the caller at handler construction time;
/// everything that can go wrong per emission is contained inside the engine
/// and reported through the stderr fallback instead.
#[derive(Error, Debug)]
pub enum LogmillError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Level already registered: {0}")]
    LevelConflict(String),

    #[error("Filter failed: {0}")]
    FilterFailed(String),

    #[error("Callable sink failed: {0}")]
    CallableFailed(String),
}
