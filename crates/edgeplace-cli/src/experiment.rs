//! Builds engines, policies and workloads from the loaded configuration

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use edgeplace_core::{FixedWorkload, Task, WorkloadGenerator, WorkloadSource};
use edgeplace_rl::{
    EngineConfig, PlacementEngine, QLearningOrchestrator, QTableSnapshot, RandomOrchestrator,
    RuleBasedOrchestrator, TracingReporter,
};

use crate::config::AppConfig;

/// Independent seed streams derived from `experiment.seed`
#[derive(Debug, Clone, Copy)]
pub struct Seeds {
    pub training_workload: u64,
    pub evaluation_workload: u64,
    pub simulator: u64,
    pub q_learning: u64,
    pub random: u64,
}

impl Seeds {
    pub fn from_base(seed: u64) -> Self {
        Self {
            training_workload: seed,
            evaluation_workload: seed.wrapping_add(1),
            simulator: seed.wrapping_add(2),
            q_learning: seed.wrapping_add(3),
            random: seed.wrapping_add(4),
        }
    }
}

pub struct Experiment {
    pub config: AppConfig,
    pub seeds: Seeds,
}

impl Experiment {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let seeds = Seeds::from_base(config.experiment.seed);
        Ok(Self { config, seeds })
    }

    pub fn engine(&self) -> Result<PlacementEngine> {
        let simulator = self
            .config
            .simulator
            .build(self.seeds.simulator)
            .context("Failed to build latency simulator")?;
        let reward_fn = self.config.learning.reward_fn()?;
        let experiment = &self.config.experiment;

        let engine = PlacementEngine::new(
            self.config.node_set(),
            self.config.encoder.clone(),
            simulator,
            reward_fn,
        )?
        .with_config(EngineConfig {
            completion_window: (experiment.completion_window > 0)
                .then_some(experiment.completion_window),
            reuse_workload: experiment.reuse_workload,
            ..EngineConfig::default()
        })
        .with_reporter(Arc::new(TracingReporter));
        Ok(engine)
    }

    fn workload(&self, seed: u64) -> Result<Box<dyn WorkloadSource>> {
        if let Some(path) = &self.config.workload.file {
            info!("Replaying workload from {}", path.display());
            let fixed = FixedWorkload::load(path)
                .with_context(|| format!("Failed to load workload {}", path.display()))?;
            return Ok(Box::new(fixed));
        }

        let mut generator = WorkloadGenerator::new(seed)?;
        if let Some(lambda) = self.config.workload.poisson_lambda {
            generator = generator.with_poisson_arrivals(lambda)?;
        }
        Ok(Box::new(generator))
    }

    pub fn training_workload(&self) -> Result<Box<dyn WorkloadSource>> {
        self.workload(self.seeds.training_workload)
    }

    /// The task list every policy is evaluated on
    pub fn evaluation_tasks(&self, count: usize) -> Result<Vec<Task>> {
        let mut source = self.workload(self.seeds.evaluation_workload)?;
        Ok(source.produce(count)?)
    }

    pub fn new_q_learning(&self, engine: &PlacementEngine) -> Result<QLearningOrchestrator> {
        Ok(QLearningOrchestrator::new(
            self.config.learning.clone(),
            engine.encoder().clone(),
            engine.action_count(),
            self.seeds.q_learning,
        )?)
    }

    pub fn load_q_learning(
        &self,
        engine: &PlacementEngine,
        table: &Path,
    ) -> Result<QLearningOrchestrator> {
        let snapshot = QTableSnapshot::load(table)
            .with_context(|| format!("Failed to load Q-table {}", table.display()))?;
        QLearningOrchestrator::from_snapshot(
            self.config.learning.clone(),
            engine.encoder().clone(),
            &snapshot,
            engine.action_count(),
            self.seeds.q_learning,
        )
        .with_context(|| {
            format!(
                "Q-table {} does not match the configured nodes and encoder",
                table.display()
            )
        })
    }

    pub fn random(&self) -> RandomOrchestrator {
        RandomOrchestrator::new(self.seeds.random)
    }

    pub fn rule_based(&self) -> Result<RuleBasedOrchestrator> {
        Ok(RuleBasedOrchestrator::from_config(&self.config.rule)?)
    }
}
