//! CLI command implementations

pub mod check;
pub mod config;
pub mod sync;

pub use check::CheckArgs;
pub use config::ConfigArgs;
pub use sync::{HandleArgs, SyncArgs};

use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use cistatus_core::{CiReport, Config, RepoConfig};

/// Look up the CI label settings for `owner/repo`
pub(crate) fn repo_settings<'a>(
    config: &'a Config,
    repo: &str,
) -> anyhow::Result<(String, String, &'a RepoConfig)> {
    let (owner, name) = cistatus_github::parse_github_url(repo)?;

    let settings = config
        .for_repo(&owner, &name)
        .ok_or_else(|| anyhow!("No configuration for {}/{}", owner, name))?;

    if !settings.enable_label_for_ci {
        bail!("CI labels are disabled for {}/{}", owner, name);
    }

    settings
        .ci
        .validate()
        .with_context(|| format!("Invalid CI label configuration for {}/{}", owner, name))?;

    Ok((owner, name, settings))
}

/// Job count from the command line, falling back to the repository setting
pub(crate) fn expected_jobs(flag: Option<usize>, settings: &RepoConfig) -> anyhow::Result<usize> {
    flag.or(settings.expected_jobs)
        .ok_or_else(|| anyhow!("Expected job count unknown: pass --jobs or set expected_jobs"))
}

/// Read a comment body from a file, or stdin for `-`
pub(crate) fn read_comment(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read comment from stdin")?;
        return Ok(body);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comment from {}", path.display()))
}

pub(crate) fn print_report(report: &CiReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Jobs classified: {}", report.statuses.len());
    if report.dropped_rows > 0 {
        println!("Rows dropped:    {}", report.dropped_rows);
    }
    println!(
        "Statuses:        {}",
        report
            .status_set
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Aggregate:       {}",
        report.aggregate.as_deref().unwrap_or("(none)")
    );
    if report.downgraded {
        println!("  (some jobs have not reported yet)");
    }
    println!(
        "Label:           {}",
        report.desired.as_deref().unwrap_or("(none)")
    );

    println!();
    if report.ops.is_empty() {
        println!("Labels already up to date.");
    } else {
        for op in &report.ops {
            println!("  {}", op);
        }
    }

    Ok(())
}
