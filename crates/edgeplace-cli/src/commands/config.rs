//! Configuration management commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration as TOML
    Show,
    /// Check the configuration without running anything
    Validate,
}

pub fn run(cmd: ConfigCommands, config: &AppConfig, source: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config, source),
        ConfigCommands::Validate => validate(config, source),
    }
}

fn describe(source: Option<&Path>) -> String {
    source.map_or_else(
        || "none (defaults and environment)".to_string(),
        |p| p.display().to_string(),
    )
}

fn show(config: &AppConfig, source: Option<&Path>) -> Result<()> {
    let rendered =
        toml::to_string_pretty(config).context("Failed to render configuration as TOML")?;
    println!("# Config file: {}\n", describe(source));
    println!("{rendered}");
    Ok(())
}

fn validate(config: &AppConfig, source: Option<&Path>) -> Result<()> {
    config.validate()?;
    println!("Configuration OK ({})", describe(source));
    println!(
        "  {} nodes, {} episodes x {} tasks, seed {}",
        config.nodes.len(),
        config.experiment.episodes,
        config.experiment.tasks_per_episode,
        config.experiment.seed
    );
    Ok(())
}
