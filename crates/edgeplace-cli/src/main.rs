//! edgeplace CLI - Command line interface for the placement engine
//!
//! Trains the Q-learning placement policy, evaluates saved tables and
//! compares the learned policy against the random and rule-based baselines.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod experiment;

use commands::{compare, evaluate, train, workload};
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "edgeplace")]
#[command(author, version, about = "edgeplace - learned edge/cloud task placement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./edgeplace.toml or ~/.config/edgeplace/edgeplace.toml)
    #[arg(short, long, global = true, env = "EDGEPLACE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the Q-learning policy and save its table
    Train(train::TrainArgs),

    /// Evaluate a saved Q-table
    Evaluate(evaluate::EvaluateArgs),

    /// Compare Q-learning against the random and rule-based baselines
    Compare(compare::CompareArgs),

    /// Workload operations
    #[command(subcommand)]
    Workload(workload::WorkloadCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("edgeplace={level},edgeplace_core={level},edgeplace_rl={level}").into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(AppConfig::find_config_file);
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize logging based on verbosity, then the configured level
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.experiment.log_level.as_str()
    };
    init_tracing(log_level, cli.log_json);

    match &config_path {
        Some(path) => debug!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Train(args) => train::run(&args, config),
        Commands::Evaluate(args) => evaluate::run(&args, config),
        Commands::Compare(args) => compare::run(&args, config),
        Commands::Workload(cmd) => workload::run(cmd, &config),
        Commands::Config(cmd) => commands::config::run(cmd, &config, config_path.as_deref()),
    }
}
