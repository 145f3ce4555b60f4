//! Workload commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use edgeplace_core::{FixedWorkload, TaskKind, WorkloadGenerator, WorkloadSource};

use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum WorkloadCommands {
    /// Generate a task list and write it as JSON
    Generate {
        /// Number of tasks
        #[arg(short = 'n', long)]
        count: usize,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Generator seed (defaults to experiment.seed)
        #[arg(long)]
        seed: Option<u64>,
    },
}

pub fn run(cmd: WorkloadCommands, config: &AppConfig) -> Result<()> {
    match cmd {
        WorkloadCommands::Generate { count, out, seed } => generate(config, count, &out, seed),
    }
}

fn generate(config: &AppConfig, count: usize, out: &Path, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or(config.experiment.seed);
    let mut generator = WorkloadGenerator::new(seed)?;
    if let Some(lambda) = config.workload.poisson_lambda {
        generator = generator.with_poisson_arrivals(lambda)?;
    }

    let tasks = generator.produce(count)?;
    let workload = FixedWorkload::new(tasks);
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    workload
        .save_json(out)
        .with_context(|| format!("Failed to write workload to {}", out.display()))?;

    println!("Wrote {} tasks to {} (seed {seed})\n", workload.len(), out.display());
    println!("{:<8} {:>7} {:>10}", "KIND", "TASKS", "MEAN_SIZE");
    println!("{}", "-".repeat(27));
    for kind in TaskKind::ALL {
        let sizes: Vec<f64> = workload
            .tasks()
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.size)
            .collect();
        let mean = if sizes.is_empty() {
            0.0
        } else {
            sizes.iter().sum::<f64>() / sizes.len() as f64
        };
        println!("{:<8} {:>7} {:>10.3}", kind.to_string(), sizes.len(), mean);
    }
    Ok(())
}
