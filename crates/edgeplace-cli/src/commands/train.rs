//! Q-learning training command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::experiment::Experiment;

use super::write_json;

#[derive(Args)]
pub struct TrainArgs {
    /// Number of episodes (overrides experiment.episodes)
    #[arg(short, long)]
    pub episodes: Option<usize>,

    /// Where to save the Q-table (default: <output_dir>/q_table.json)
    #[arg(short, long)]
    pub save: Option<PathBuf>,
}

pub fn run(args: &TrainArgs, mut config: AppConfig) -> Result<()> {
    if let Some(episodes) = args.episodes {
        config.experiment.episodes = episodes;
    }
    let experiment = Experiment::new(config)?;
    let settings = &experiment.config.experiment;

    let mut engine = experiment.engine()?;
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

    let table_path = args
        .save
        .clone()
        .unwrap_or_else(|| settings.output_dir.join("q_table.json"));
    policy
        .snapshot()
        .save(&table_path)
        .with_context(|| format!("Failed to save Q-table to {}", table_path.display()))?;
    let stats_path = table_path.with_file_name("training_stats.json");
    write_json(&stats_path, &summary)?;
    info!("Saved Q-table to {}", table_path.display());

    println!("Training complete");
    println!("=================\n");
    println!("Episodes:        {}", summary.episodes.len());
    println!("Updates:         {}", policy.updates());
    println!(
        "Visited entries: {} of {}",
        policy.table().visited_entries(),
        policy.table().rows() * policy.table().cols()
    );
    if let Some(last) = summary.episodes.last() {
        println!("Final latency:   {:.2} ms", last.avg_latency_ms);
        println!("Final epsilon:   {:.4}", last.epsilon.unwrap_or(0.0));
    }
    if let Some(recent) = summary.recent_avg_latency(10) {
        println!("Last 10 avg:     {recent:.2} ms");
    }
    println!("\nQ-table:     {}", table_path.display());
    println!("Statistics:  {}", stats_path.display());

    Ok(())
}
