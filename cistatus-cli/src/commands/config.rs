//! Config command - show and validate configuration

use std::path::Path;

use clap::Args;
use cistatus_core::Config;

/// Show the loaded configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Validate every repository entry and fail on the first error
    #[arg(long)]
    pub validate: bool,
}

impl ConfigArgs {
    /// Execute the config command
    pub fn execute(&self, config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
        println!("cistatus Configuration");
        println!("======================");
        println!();
        println!("bot_name: {}", config.bot_name.as_deref().unwrap_or("(token owner)"));
        println!();

        for entry in &config.repos {
            println!("Repos: {}", entry.repos.join(", "));
            println!("  enable_label_for_ci: {}", entry.enable_label_for_ci);
            if !entry.enable_label_for_ci {
                continue;
            }

            println!("  title_of_ci_table: {}", entry.ci.title_of_ci_table);
            if let Some(jobs) = entry.expected_jobs {
                println!("  expected_jobs: {}", jobs);
            }
            for d in entry.ci.descriptors() {
                println!(
                    "  [{}] {} <- {}",
                    d.priority,
                    d.label,
                    d.patterns.join(" | ")
                );
            }
            println!();
        }

        let shown = path
            .map(Path::to_path_buf)
            .or_else(Config::default_config_path);
        if let Some(p) = shown {
            println!("Config file: {}", p.display());
            if !p.exists() {
                println!("  (not found - using defaults)");
            }
        }

        if self.validate {
            config.validate()?;
            println!();
            println!("Configuration is valid.");
        }

        Ok(())
    }
}
