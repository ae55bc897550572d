//! Error types for deployd

use thiserror::Error;

/// Main error type for deployd
#[derive(Error, Debug)]
pub enum DeploydError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid project folder: {0}")]
    InvalidProject(String),

    #[error("Status file error: {0}")]
    StatusFileError(String),

    #[error("Status store unavailable: {0}")]
    StatusStoreClosed(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),
}
