//! Side-by-side comparison of the learned policy and the baselines

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tracing::info;

use edgeplace_rl::{EvaluationReport, Orchestrator, TrainingSummary};

use crate::config::AppConfig;
use crate::experiment::Experiment;

use super::{print_reports, write_json};

#[derive(Args)]
pub struct CompareArgs {
    /// Use a saved Q-table instead of training a fresh one
    #[arg(short, long)]
    pub table: Option<PathBuf>,
}

/// Everything a comparison run produced, as written to `results.json`
#[derive(Serialize)]
struct RunResults<'a> {
    run_id: &'a str,
    created_at: DateTime<Utc>,
    config: &'a AppConfig,
    table: Option<&'a PathBuf>,
    training: Option<&'a TrainingSummary>,
    best_policy: Option<&'a str>,
    metrics: BTreeMap<String, f64>,
    reports: &'a [EvaluationReport],
}

pub fn run_id(now: DateTime<Utc>) -> String {
    now.format("run-%Y%m%dT%H%M%SZ").to_string()
}

pub fn run(args: &CompareArgs, config: AppConfig) -> Result<()> {
    let experiment = Experiment::new(config)?;
    let settings = &experiment.config.experiment;
    let started = Utc::now();
    let run_id = run_id(started);
    info!("Starting comparison {}", run_id);

    let mut engine = experiment.engine()?;
    let (mut q_learning, training) = match &args.table {
        Some(table) => (experiment.load_q_learning(&engine, table)?, None),
        None => {
            let mut policy = experiment.new_q_learning(&engine)?;
            let mut workload = experiment.training_workload()?;
            let summary = engine
                .train(
                    &mut policy,
                    workload.as_mut(),
                    settings.episodes,
                    settings.tasks_per_episode,
                )
                .context("Training failed")?;
            (policy, Some(summary))
        }
    };
    let mut random = experiment.random();
    let mut rule = experiment.rule_based()?;

    let tasks = experiment.evaluation_tasks(settings.eval_tasks)?;
    let mut policies: [&mut dyn Orchestrator; 3] = [&mut q_learning, &mut random, &mut rule];
    let comparison = engine
        .compare(&mut policies, &tasks)
        .context("Evaluation failed")?;

    let results = RunResults {
        run_id: &run_id,
        created_at: started,
        config: &experiment.config,
        table: args.table.as_ref(),
        training: training.as_ref(),
        best_policy: comparison.best().map(|r| r.policy.as_str()),
        metrics: comparison.to_metrics(),
        reports: &comparison.reports,
    };
    let results_path = settings.output_dir.join(&run_id).join("results.json");
    write_json(&results_path, &results)?;

    println!("Comparison {run_id} ({} tasks)\n", tasks.len());
    print_reports(&comparison.reports);
    if let Some(best) = comparison.best() {
        println!("\nLowest mean latency: {}", best.policy);
    }
    println!("Results: {}", results_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_id_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(run_id(at), "run-20240309T140507Z");
    }
}
