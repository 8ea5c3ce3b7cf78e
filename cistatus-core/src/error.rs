//! Error types for cistatus

use thiserror::Error;

use crate::labels::LabelOpErrors;

/// Result type alias for cistatus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by review platform collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for cistatus operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Review platform call failed (listing comments or labels)
    #[error("Platform error: {0}")]
    Platform(BoxError),

    /// One or more label operations failed
    #[error(transparent)]
    LabelOps(#[from] LabelOpErrors),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
