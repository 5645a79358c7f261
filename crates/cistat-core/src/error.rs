//! Unified error types for cistat

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all cistat operations
#[derive(Error, Debug)]
pub enum CistatError {
    // Configuration errors
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Required setting missing: {0}")]
    MissingSetting(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Invalid exclusion pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // CI server errors
    #[error("CI server request failed: {0}")]
    CiTransport(String),

    #[error("CI server returned {status}: {body}")]
    CiStatus { status: u16, body: String },

    #[error("Unexpected CI server response: {0}")]
    CiResponse(String),

    // Collector errors
    #[error("Collector error: {0}")]
    Collector(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used when logging and recovering from errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at startup
    Configuration,
    /// Recovered on the next poll
    CiServer,
    /// Recovered by dropping the metric
    Collector,
    Other,
}

impl CistatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CistatError::ConfigNotFound(_)
            | CistatError::ConfigParse(_)
            | CistatError::MissingSetting(_)
            | CistatError::InvalidSetting(_)
            | CistatError::InvalidPattern { .. } => ErrorKind::Configuration,
            CistatError::CiTransport(_)
            | CistatError::CiStatus { .. }
            | CistatError::CiResponse(_) => ErrorKind::CiServer,
            CistatError::Collector(_) => ErrorKind::Collector,
            CistatError::Io(_) | CistatError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Result type alias using CistatError
pub type Result<T> = std::result::Result<T, CistatError>;
