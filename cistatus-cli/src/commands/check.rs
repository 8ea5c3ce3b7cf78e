//! Check command - evaluate a CI comment offline

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Args;
use cistatus_core::{CiLabeler, Config};

use super::{expected_jobs, print_report, read_comment, repo_settings};

/// Evaluate a CI comment without contacting GitHub
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Repository whose configuration applies (owner/repo)
    #[arg(short, long)]
    pub repo: String,

    /// File holding the comment body, `-` for stdin
    #[arg(short = 'f', long, default_value = "-")]
    pub comment_file: PathBuf,

    /// Labels currently on the pull request
    #[arg(short, long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Number of jobs a complete CI run reports
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (owner, repo, settings) = repo_settings(config, &self.repo)?;
        let jobs = expected_jobs(self.jobs, settings)?;
        let comment = read_comment(&self.comment_file)?;

        tracing::debug!(%owner, %repo, jobs, "Checking CI comment");

        let applied: BTreeSet<String> = self.labels.iter().cloned().collect();
        let labeler = CiLabeler::new(&settings.ci);

        match labeler.process_comment(&comment, &applied, jobs) {
            Ok(report) => print_report(&report, self.json),
            Err(e) => {
                println!("No CI table recognized: {}", e);
                Ok(())
            }
        }
    }
}
