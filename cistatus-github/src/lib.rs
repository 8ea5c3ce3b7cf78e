//! cistatus GitHub - GitHub integration for cistatus
//!
//! This crate reads pull request comments and labels and applies label
//! changes through the GitHub API.

mod client;
mod error;
mod pulls;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
