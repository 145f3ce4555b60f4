//! Evaluation of a saved Q-table

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::AppConfig;
use crate::experiment::Experiment;

use super::print_reports;

#[derive(Args)]
pub struct EvaluateArgs {
    /// Saved Q-table
    #[arg(short, long)]
    pub table: PathBuf,

    /// Number of evaluation tasks (overrides experiment.eval_tasks)
    #[arg(long)]
    pub tasks: Option<usize>,
}

pub fn run(args: &EvaluateArgs, mut config: AppConfig) -> Result<()> {
    if let Some(tasks) = args.tasks {
        config.experiment.eval_tasks = tasks;
    }
    let experiment = Experiment::new(config)?;

    let mut engine = experiment.engine()?;
    let mut policy = experiment.load_q_learning(&engine, &args.table)?;
    let tasks = experiment.evaluation_tasks(experiment.config.experiment.eval_tasks)?;

    let report = engine
        .evaluate(&mut policy, &tasks)
        .context("Evaluation failed")?;

    println!("Evaluation of {}\n", args.table.display());
    print_reports(std::slice::from_ref(&report));
    if report.skipped > 0 {
        println!("\nSkipped {} invalid tasks", report.skipped);
    }
    Ok(())
}
