//! cistatus core - CI table parsing and label reconciliation
//!
//! This crate reads the CI status table a bot posts on a pull request,
//! reduces the per-job results to one verdict and works out which labels
//! have to change for the pull request to carry exactly that verdict.

pub mod config;
pub mod error;
pub mod labels;
pub mod parser;
pub mod pipeline;
pub mod secrets;

pub use config::{CiLabelConfig, Config, RepoConfig, StatusDescAndLabel, StatusDescriptor};
pub use error::{BoxError, Error, Result};
pub use labels::{apply_label_ops, plan_label_ops, LabelApi, LabelOp, LabelOpErrors};
pub use parser::{CiParser, ClassifiedTable, ExtractError, RowError};
pub use pipeline::{is_check_ci_command, latest_ci_comment, CiLabeler, CiReport, Comment, CommentSource};
pub use secrets::Secrets;
