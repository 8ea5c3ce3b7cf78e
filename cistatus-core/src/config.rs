//! Configuration management for cistatus
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CISTATUS_*)
//! 3. Config file (~/.config/cistatus/config.toml)
//! 4. Default values
//!
//! Each `[[repos]]` entry binds a CI table title and up to four status
//! descriptors to a set of repositories. Descriptor priorities are fixed:
//! error > failure > running > success.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const ERROR_PRIORITY: u32 = 4;
const FAILURE_PRIORITY: u32 = 3;
const RUNNING_PRIORITY: u32 = 2;
const SUCCESS_PRIORITY: u32 = 1;

/// Text patterns for one job outcome and the label standing for it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusDescAndLabel {
    /// Substrings that identify the outcome in the result column
    pub desc: Vec<String>,

    /// Label applied to the pull request for this outcome
    pub label: String,
}

impl StatusDescAndLabel {
    /// Create a descriptor from patterns and a label
    pub fn new<I, S>(desc: I, label: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            desc: desc.into_iter().map(Into::into).collect(),
            label: label.into(),
        }
    }

    /// An unset descriptor is skipped entirely
    pub fn is_empty(&self) -> bool {
        self.desc.is_empty() && self.label.is_empty()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.desc.is_empty() {
            return Err("missing desc".to_string());
        }

        let unique: BTreeSet<&str> = self.desc.iter().map(String::as_str).collect();
        if unique.len() != self.desc.len() {
            return Err("duplicate desc items".to_string());
        }

        if self.label.is_empty() {
            return Err("missing label".to_string());
        }

        Ok(())
    }
}

/// A registry entry: patterns mapped to a canonical label with a priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDescriptor {
    /// Any of these substrings selects this descriptor
    pub patterns: Vec<String>,
    /// Canonical status label
    pub label: String,
    /// Higher wins during aggregation
    pub priority: u32,
}

impl StatusDescriptor {
    /// Build a descriptor
    pub fn new<I, S>(patterns: I, label: impl Into<String>, priority: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            label: label.into(),
            priority,
        }
    }

    /// Case-sensitive substring match against any pattern
    pub fn matches(&self, description: &str) -> bool {
        self.patterns.iter().any(|p| description.contains(p.as_str()))
    }
}

/// CI table layout and status descriptors for one set of repositories
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CiLabelConfig {
    /// Header line of the CI table, e.g. `| job name | result | detail |`
    ///
    /// The table must have the job result in its second column.
    pub title_of_ci_table: String,

    /// A job could not be created
    pub job_error_status: StatusDescAndLabel,

    /// A job failed
    pub job_failure_status: StatusDescAndLabel,

    /// A job is still running
    pub job_running_status: StatusDescAndLabel,

    /// A job succeeded
    pub job_success_status: StatusDescAndLabel,
}

impl CiLabelConfig {
    /// Descriptor slots in registry order, with their config key and priority
    fn slots(&self) -> [(&'static str, u32, &StatusDescAndLabel); 4] {
        [
            ("job_error_status", ERROR_PRIORITY, &self.job_error_status),
            ("job_failure_status", FAILURE_PRIORITY, &self.job_failure_status),
            ("job_running_status", RUNNING_PRIORITY, &self.job_running_status),
            ("job_success_status", SUCCESS_PRIORITY, &self.job_success_status),
        ]
    }

    /// Check title presence and label/desc uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.title_of_ci_table.is_empty() {
            return Err(Error::Config("missing title_of_ci_table".to_string()));
        }

        let mut labels = BTreeSet::new();
        let mut descs = BTreeSet::new();
        let mut label_count = 0;
        let mut desc_count = 0;

        for (key, _, item) in self.slots() {
            if item.is_empty() {
                continue;
            }

            item.validate()
                .map_err(|e| Error::Config(format!("for {}: {}", key, e)))?;

            labels.insert(item.label.as_str());
            label_count += 1;

            descs.extend(item.desc.iter().map(String::as_str));
            desc_count += item.desc.len();
        }

        if labels.len() != label_count {
            return Err(Error::Config("duplicate labels".to_string()));
        }

        if descs.len() != desc_count {
            return Err(Error::Config("duplicate desc".to_string()));
        }

        Ok(())
    }

    /// The status registry, in configuration order, skipping unset slots
    pub fn descriptors(&self) -> Vec<StatusDescriptor> {
        self.slots()
            .into_iter()
            .filter(|(_, _, item)| !item.is_empty())
            .map(|(_, priority, item)| {
                StatusDescriptor::new(item.desc.iter().cloned(), item.label.clone(), priority)
            })
            .collect()
    }

    /// Every label this subsystem may add or remove
    pub fn label_universe(&self) -> BTreeSet<String> {
        self.slots()
            .into_iter()
            .filter(|(_, _, item)| !item.is_empty())
            .map(|(_, _, item)| item.label.clone())
            .collect()
    }

    /// Label for a fully successful run, if configured
    pub fn success_label(&self) -> Option<&str> {
        non_empty(&self.job_success_status.label)
    }

    /// Label for a run that is still in progress, if configured
    pub fn running_label(&self) -> Option<&str> {
        non_empty(&self.job_running_status.label)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Settings for one group of repositories
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RepoConfig {
    /// `owner/repo` or a whole `owner`
    pub repos: Vec<String>,

    /// Whether CI labels are managed for these repositories
    pub enable_label_for_ci: bool,

    /// Number of jobs a full CI run reports, when not supplied per call
    pub expected_jobs: Option<usize>,

    /// Table layout and descriptors
    #[serde(flatten)]
    pub ci: CiLabelConfig,
}

impl RepoConfig {
    fn validate(&self) -> Result<()> {
        if self.repos.is_empty() {
            return Err(Error::Config("missing repos".to_string()));
        }

        if !self.enable_label_for_ci {
            return Ok(());
        }

        self.ci.validate().map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", self.repos.join(", "), msg)),
            other => other,
        })
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Login of the account that posts CI tables
    pub bot_name: Option<String>,

    /// Per-repository settings
    pub repos: Vec<RepoConfig>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/cistatus/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cistatus").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CISTATUS_BOT_NAME: Login of the CI bot
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bot) = std::env::var("CISTATUS_BOT_NAME") {
            if !bot.trim().is_empty() {
                self.bot_name = Some(bot.trim().to_string());
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, bot_name: Option<String>) -> Self {
        if let Some(bot) = bot_name {
            self.bot_name = Some(bot);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// An explicit `path` must exist; otherwise the default location is
    /// tried. Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(path: Option<&Path>, bot_name: Option<String>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::load()?,
        };

        Ok(config.with_env_overrides().with_cli_overrides(bot_name))
    }

    /// Validate every repository entry
    pub fn validate(&self) -> Result<()> {
        self.repos.iter().try_for_each(RepoConfig::validate)
    }

    /// Find the settings for a repository
    ///
    /// An exact `owner/repo` entry takes precedence over an `owner` entry.
    pub fn for_repo(&self, owner: &str, repo: &str) -> Option<&RepoConfig> {
        let full = format!("{}/{}", owner, repo);

        self.repos
            .iter()
            .find(|c| c.repos.iter().any(|r| *r == full))
            .or_else(|| self.repos.iter().find(|c| c.repos.iter().any(|r| r == owner)))
    }
}
