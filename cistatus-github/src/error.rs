//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Pull request not found
    #[error("Pull request #{0} not found")]
    PrNotFound(u64),

    /// Label is not on the pull request
    #[error("Label {label:?} not found on pull request #{pr_number}")]
    LabelNotFound { pr_number: u64, label: String },

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Map a "Not Found" API response to a more specific error
    pub(crate) fn or_not_found(err: octocrab::Error, not_found: impl FnOnce() -> Error) -> Error {
        match &err {
            octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                not_found()
            }
            _ => Error::Api(err),
        }
    }
}
