//! Sync and handle commands - reconcile CI labels on GitHub

use std::path::PathBuf;

use clap::Args;
use cistatus_core::{CiLabeler, CiReport, Config};
use cistatus_github::GitHubClient;

use super::{expected_jobs, print_report, read_comment, repo_settings};

/// Recompute the CI label from the latest CI comment on a pull request
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Repository (owner/repo or URL)
    #[arg(short, long)]
    pub repo: String,

    /// Pull request number
    #[arg(short, long)]
    pub pr: u64,

    /// Number of jobs a complete CI run reports
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Compute label changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    /// Execute the sync command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (owner, repo, settings) = repo_settings(config, &self.repo)?;
        let jobs = expected_jobs(self.jobs, settings)?;

        let client = GitHubClient::new(owner, repo)?;
        let bot = bot_login(config, &client).await?;
        let labeler = CiLabeler::new(&settings.ci);

        let report = labeler
            .recheck(&client, self.pr, &bot, jobs, self.dry_run)
            .await?;

        finish(report, self.pr, self.dry_run, self.json)
    }
}

/// Process a newly created pull request comment
#[derive(Args, Debug)]
pub struct HandleArgs {
    /// Repository (owner/repo or URL)
    #[arg(short, long)]
    pub repo: String,

    /// Pull request number
    #[arg(short, long)]
    pub pr: u64,

    /// File holding the comment body, `-` for stdin
    #[arg(short = 'f', long, default_value = "-")]
    pub comment_file: PathBuf,

    /// Number of jobs a complete CI run reports
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Compute label changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl HandleArgs {
    /// Execute the handle command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (owner, repo, settings) = repo_settings(config, &self.repo)?;
        let jobs = expected_jobs(self.jobs, settings)?;
        let body = read_comment(&self.comment_file)?;

        let client = GitHubClient::new(owner, repo)?;
        let bot = bot_login(config, &client).await?;
        let labeler = CiLabeler::new(&settings.ci);

        let report = labeler
            .handle_comment_event(&client, self.pr, &body, &bot, jobs, self.dry_run)
            .await?;

        finish(report, self.pr, self.dry_run, self.json)
    }
}

/// Configured bot login, or the account the token belongs to
async fn bot_login(config: &Config, client: &GitHubClient) -> anyhow::Result<String> {
    match &config.bot_name {
        Some(bot) => Ok(bot.clone()),
        None => Ok(client.current_login().await?),
    }
}

fn finish(report: Option<CiReport>, pr: u64, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let Some(report) = report else {
        println!("No CI table found for PR #{}; labels unchanged.", pr);
        return Ok(());
    };

    print_report(&report, json)?;

    if dry_run && !report.ops.is_empty() && !json {
        println!();
        println!("[Dry run] No labels were changed");
    }

    Ok(())
}
