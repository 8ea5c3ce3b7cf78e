//! Pull request labels and comments
//!
//! GitHub treats pull requests as issues for labels and conversation
//! comments, so everything here goes through the issues API.

use async_trait::async_trait;
use cistatus_core::{BoxError, Comment, CommentSource, LabelApi};
use tracing::{debug, info};

use crate::{Error, GitHubClient, Result};

const PAGE_SIZE: u8 = 100;

impl GitHubClient {
    /// Names of the labels currently on a pull request
    pub async fn list_pr_labels(&self, pr_number: u64) -> Result<Vec<String>> {
        debug!(pr_number, "Listing pull request labels");

        let page = self
            .client()
            .issues(self.owner(), self.repo())
            .list_labels_for_issue(pr_number)
            .per_page(PAGE_SIZE)
            .send()
            .await
            .map_err(|e| Error::or_not_found(e, || Error::PrNotFound(pr_number)))?;

        let labels = self.client().all_pages(page).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    /// Add a label to a pull request
    pub async fn add_pr_label(&self, pr_number: u64, label: &str) -> Result<()> {
        info!(pr_number, label, "Adding label");

        self.client()
            .issues(self.owner(), self.repo())
            .add_labels(pr_number, &[label.to_string()])
            .await
            .map_err(|e| Error::or_not_found(e, || Error::PrNotFound(pr_number)))?;

        Ok(())
    }

    /// Remove a label from a pull request
    pub async fn remove_pr_label(&self, pr_number: u64, label: &str) -> Result<()> {
        info!(pr_number, label, "Removing label");

        self.client()
            .issues(self.owner(), self.repo())
            .remove_label(pr_number, label)
            .await
            .map_err(|e| {
                Error::or_not_found(e, || Error::LabelNotFound {
                    pr_number,
                    label: label.to_string(),
                })
            })?;

        Ok(())
    }

    /// All conversation comments on a pull request, oldest first
    pub async fn list_pr_comments(&self, pr_number: u64) -> Result<Vec<Comment>> {
        debug!(pr_number, "Listing pull request comments");

        let page = self
            .client()
            .issues(self.owner(), self.repo())
            .list_comments(pr_number)
            .per_page(PAGE_SIZE)
            .send()
            .await
            .map_err(|e| Error::or_not_found(e, || Error::PrNotFound(pr_number)))?;

        let mut comments: Vec<Comment> = self
            .client()
            .all_pages(page)
            .await?
            .into_iter()
            .map(|c| Comment {
                id: c.id.0,
                author: c.user.login,
                body: c.body.unwrap_or_default(),
                created_at: c.created_at,
            })
            .collect();

        comments.sort_by_key(|c| c.created_at);

        info!(pr_number, count = comments.len(), "Fetched pull request comments");

        Ok(comments)
    }
}

#[async_trait]
impl LabelApi for GitHubClient {
    async fn list_labels(&self, pr_number: u64) -> std::result::Result<Vec<String>, BoxError> {
        Ok(self.list_pr_labels(pr_number).await?)
    }

    async fn add_label(&self, pr_number: u64, label: &str) -> std::result::Result<(), BoxError> {
        Ok(self.add_pr_label(pr_number, label).await?)
    }

    async fn remove_label(&self, pr_number: u64, label: &str) -> std::result::Result<(), BoxError> {
        Ok(self.remove_pr_label(pr_number, label).await?)
    }
}

#[async_trait]
impl CommentSource for GitHubClient {
    async fn list_comments(&self, pr_number: u64) -> std::result::Result<Vec<Comment>, BoxError> {
        Ok(self.list_pr_comments(pr_number).await?)
    }
}
