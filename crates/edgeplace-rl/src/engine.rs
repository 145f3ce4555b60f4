//! Placement engine - drives policies through training and evaluation episodes

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use edgeplace_core::{
    validate_nodes, LatencySimulator, Node, NodeKind, PlacementError, Result, Task,
    WorkloadSource,
};

use crate::algorithm::{Mode, Orchestrator, RewardFn};
use crate::experience::{Experience, PlacementRecord};
use crate::report::Reporter;
use crate::state::{Action, EncoderConfig, StateEncoder};
use crate::stats::{
    ComparisonReport, EpisodeStats, EvaluationReport, LatencySummary, TrainingSummary,
};

/// What to do with a task that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidTaskPolicy {
    /// Log, count and move on
    #[default]
    Skip,
    /// Fail the episode
    Abort,
}

/// Engine behaviour knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Release a task's weight this many arrivals after it was placed.
    /// `None` keeps every admitted task on its node until the episode ends.
    pub completion_window: Option<usize>,

    /// Restart the workload source before every episode so all episodes see
    /// the same task sequence
    pub reuse_workload: bool,

    pub invalid_tasks: InvalidTaskPolicy,

    /// Log a progress line every this many episodes (0 disables)
    pub log_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_window: None,
            reuse_workload: false,
            invalid_tasks: InvalidTaskPolicy::Skip,
            log_every: 10,
        }
    }
}

/// Everything one pass over a task list produced
#[derive(Debug, Default)]
struct EpisodeOutcome {
    latencies: Vec<f64>,
    rewards: Vec<f64>,
    records: Vec<PlacementRecord>,
    edge_placements: usize,
    skipped: usize,
}

impl EpisodeOutcome {
    fn placed(&self) -> usize {
        self.latencies.len()
    }

    fn stats(&self, episode: usize, epsilon: Option<f64>) -> EpisodeStats {
        let placed = self.placed();
        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        EpisodeStats {
            episode,
            avg_reward: mean(&self.rewards),
            avg_latency_ms: mean(&self.latencies),
            epsilon,
            placed,
            skipped: self.skipped,
            edge_share: if placed == 0 {
                0.0
            } else {
                self.edge_placements as f64 / placed as f64
            },
        }
    }
}

/// Owns the simulated environment and runs placement episodes against it
pub struct PlacementEngine {
    nodes: Vec<Node>,
    encoder: StateEncoder,
    simulator: Box<dyn LatencySimulator>,
    reward_fn: RewardFn,
    config: EngineConfig,
    reporter: Option<Arc<dyn Reporter>>,
}

impl PlacementEngine {
    /// Build an engine over `nodes`, which are validated and ordered by id.
    /// Actions index into that order.
    pub fn new(
        mut nodes: Vec<Node>,
        encoder_config: EncoderConfig,
        simulator: Box<dyn LatencySimulator>,
        reward_fn: RewardFn,
    ) -> Result<Self> {
        validate_nodes(&nodes)?;
        nodes.sort_by_key(|n| n.id);
        for node in &mut nodes {
            node.reset_load();
        }
        let encoder = StateEncoder::new(encoder_config, nodes.len())?;

        info!(
            "Placement engine ready: {} nodes, {} states, simulator {}",
            nodes.len(),
            encoder.state_space_size(),
            simulator.name()
        );

        Ok(Self {
            nodes,
            encoder,
            simulator,
            reward_fn,
            config: EngineConfig::default(),
            reporter: None,
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn encoder(&self) -> &StateEncoder {
        &self.encoder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of placement targets, i.e. Q-table columns
    pub fn action_count(&self) -> usize {
        self.nodes.len()
    }

    fn reset_loads(&mut self) {
        for node in &mut self.nodes {
            node.reset_load();
        }
    }

    /// Place every task of `tasks` in order, starting from empty nodes
    fn run_episode(
        &mut self,
        policy: &mut dyn Orchestrator,
        tasks: &[Task],
        learn: bool,
    ) -> Result<EpisodeOutcome> {
        self.reset_loads();

        let mut outcome = EpisodeOutcome::default();
        let mut valid = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.validate() {
                Ok(()) => valid.push(task),
                Err(err) => match self.config.invalid_tasks {
                    InvalidTaskPolicy::Skip => {
                        warn!("Skipping task {}: {}", task.id, err);
                        outcome.skipped += 1;
                    }
                    InvalidTaskPolicy::Abort => return Err(err),
                },
            }
        }

        let policy_name = policy.name().to_string();
        let mut in_flight: VecDeque<(Action, &Task)> = VecDeque::new();

        for (step, task) in valid.iter().enumerate() {
            let state = self.encoder.encode(&self.nodes, task)?;
            let action = policy.decide(&self.nodes, &state, task)?;
            let node = self.nodes.get_mut(action).ok_or_else(|| {
                PlacementError::InvalidState(format!(
                    "{policy_name} chose action {action} for {} nodes",
                    self.encoder.node_count()
                ))
            })?;

            node.admit(task);
            let latency = self.simulator.estimate_latency(node, task);
            let reward = self.reward_fn.reward(latency);
            debug!(
                "task {} ({}, {:.3}) -> {} at load {:.2}: {:.2} ms",
                task.id,
                task.kind,
                task.size,
                node.name(),
                node.load_ratio(),
                latency
            );

            if node.kind == NodeKind::Edge {
                outcome.edge_placements += 1;
            }
            if !learn {
                outcome.records.push(PlacementRecord::new(
                    &policy_name,
                    task,
                    node.id,
                    node.kind,
                    latency,
                    reward,
                ));
            }
            outcome.latencies.push(latency);
            outcome.rewards.push(reward);

            if let Some(window) = self.config.completion_window {
                in_flight.push_back((action, *task));
                while in_flight.len() > window {
                    if let Some((position, finished)) = in_flight.pop_front() {
                        self.nodes[position].release(finished);
                    }
                }
            }

            if learn {
                let next_task = valid.get(step + 1);
                let next_state = match next_task {
                    Some(next) => Some(self.encoder.encode(&self.nodes, next)?),
                    None => None,
                };
                let done = next_state.is_none();
                policy.update(&Experience::new(state, action, reward, next_state, done))?;
            }
        }

        Ok(outcome)
    }

    /// Train `policy` for `episodes` episodes of `tasks_per_episode` tasks
    pub fn train(
        &mut self,
        policy: &mut dyn Orchestrator,
        workload: &mut dyn WorkloadSource,
        episodes: usize,
        tasks_per_episode: usize,
    ) -> Result<TrainingSummary> {
        self.train_until(policy, workload, episodes, tasks_per_episode, |_| false)
    }

    /// Like [`PlacementEngine::train`], but checks `should_stop` before each
    /// episode and ends training early once it returns true
    pub fn train_until<F>(
        &mut self,
        policy: &mut dyn Orchestrator,
        workload: &mut dyn WorkloadSource,
        episodes: usize,
        tasks_per_episode: usize,
        should_stop: F,
    ) -> Result<TrainingSummary>
    where
        F: Fn(usize) -> bool,
    {
        policy.set_mode(Mode::Train);
        info!(
            "Training {} for {} episodes of {} tasks",
            policy.name(),
            episodes,
            tasks_per_episode
        );

        let mut summary = TrainingSummary {
            policy: policy.name().to_string(),
            ..TrainingSummary::default()
        };

        for episode in 0..episodes {
            if should_stop(episode) {
                info!("Stop requested, ending training before episode {}", episode);
                summary.stopped_early = true;
                break;
            }

            if self.config.reuse_workload {
                workload.restart();
            }
            let tasks = workload.produce(tasks_per_episode)?;

            let epsilon = policy.epsilon();
            let outcome = self.run_episode(policy, &tasks, true)?;
            let stats = outcome.stats(episode, epsilon);

            if let Some(reporter) = &self.reporter {
                reporter.episode_completed(&stats);
            }
            let log_every = self.config.log_every;
            if log_every > 0 && ((episode + 1) % log_every == 0 || episode + 1 == episodes) {
                info!(
                    "Episode {}/{}: avg latency {:.2} ms, avg reward {:.3}, edge share {:.2}, epsilon {:.3}",
                    episode + 1,
                    episodes,
                    stats.avg_latency_ms,
                    stats.avg_reward,
                    stats.edge_share,
                    epsilon.unwrap_or(0.0)
                );
            }

            policy.end_episode(episode, episodes);
            summary.episodes.push(stats);
        }

        Ok(summary)
    }

    /// Run `policy` greedily over `tasks` without learning.
    ///
    /// Leaves the policy in [`Mode::Evaluate`].
    pub fn evaluate(
        &mut self,
        policy: &mut dyn Orchestrator,
        tasks: &[Task],
    ) -> Result<EvaluationReport> {
        policy.set_mode(Mode::Evaluate);
        let outcome = self.run_episode(policy, tasks, false)?;
        let summary = LatencySummary::from_latencies(&outcome.latencies);

        info!(
            "Evaluated {}: {} tasks, mean {:.2} ms, std {:.2} ms, p95 {:.2} ms",
            policy.name(),
            summary.count,
            summary.mean,
            summary.std_dev,
            summary.p95
        );
        if let Some(reporter) = &self.reporter {
            reporter.evaluation_completed(policy.name(), &summary);
        }

        Ok(EvaluationReport {
            policy: policy.name().to_string(),
            total_reward: outcome.rewards.iter().sum(),
            skipped: outcome.skipped,
            records: outcome.records,
            summary,
        })
    }

    /// Evaluate several policies on the same task list
    pub fn compare(
        &mut self,
        policies: &mut [&mut dyn Orchestrator],
        tasks: &[Task],
    ) -> Result<ComparisonReport> {
        let mut report = ComparisonReport::default();
        for policy in policies.iter_mut() {
            report.reports.push(self.evaluate(&mut **policy, tasks)?);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use edgeplace_core::{FixedWorkload, SimpleSimulator, TaskKind};

    use crate::algorithm::{QLearningConfig, QLearningOrchestrator};
    use crate::baseline::RuleBasedOrchestrator;
    use crate::state::State;

    fn engine(nodes: Vec<Node>) -> PlacementEngine {
        PlacementEngine::new(
            nodes,
            EncoderConfig::default(),
            Box::new(SimpleSimulator::new(2.0, 0.05, 0.6)),
            RewardFn::default(),
        )
        .unwrap()
    }

    fn two_nodes() -> Vec<Node> {
        vec![Node::cloud(1, 100.0, 50.0), Node::edge(0, 5.0, 10.0)]
    }

    fn unit_tasks(count: u64) -> Vec<Task> {
        (0..count).map(|i| Task::new(i, TaskKind::IoT, 1.0)).collect()
    }

    /// Always returns the same position, valid or not
    struct Fixed(Action);

    impl Orchestrator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn decide(&mut self, _nodes: &[Node], _state: &State, _task: &Task) -> Result<Action> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct Recording {
        episodes: Mutex<Vec<usize>>,
        evaluations: Mutex<Vec<String>>,
    }

    impl Reporter for Recording {
        fn episode_completed(&self, stats: &EpisodeStats) {
            self.episodes.lock().unwrap().push(stats.episode);
        }

        fn evaluation_completed(&self, policy: &str, _summary: &LatencySummary) {
            self.evaluations.lock().unwrap().push(policy.to_string());
        }
    }

    #[test]
    fn test_nodes_sorted_by_id() {
        let engine = engine(two_nodes());
        let ids: Vec<u32> = engine.nodes().iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(engine.action_count(), 2);
    }

    #[test]
    fn test_rejects_empty_node_set() {
        let result = PlacementEngine::new(
            Vec::new(),
            EncoderConfig::default(),
            Box::new(SimpleSimulator::new(2.0, 0.05, 0.6)),
            RewardFn::default(),
        );
        assert!(matches!(result, Err(PlacementError::InvalidNodeSet(_))));
    }

    #[test]
    fn test_out_of_range_action_is_an_error() {
        let mut engine = engine(two_nodes());
        let result = engine.evaluate(&mut Fixed(2), &unit_tasks(1));
        assert!(matches!(result, Err(PlacementError::InvalidState(_))));
    }

    #[test]
    fn test_invalid_tasks_are_skipped() {
        let mut engine = engine(two_nodes());
        let mut tasks = unit_tasks(3);
        tasks[1].size = -1.0;

        let report = engine.evaluate(&mut Fixed(0), &tasks).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.summary.count, 2);
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn test_invalid_tasks_abort() {
        let config = EngineConfig {
            invalid_tasks: InvalidTaskPolicy::Abort,
            ..EngineConfig::default()
        };
        let mut engine = engine(two_nodes()).with_config(config);
        let mut tasks = unit_tasks(3);
        tasks[2].size = f64::NAN;

        assert!(matches!(
            engine.evaluate(&mut Fixed(0), &tasks),
            Err(PlacementError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_load_accumulates_without_window() {
        let mut engine = engine(two_nodes());
        let report = engine.evaluate(&mut Fixed(0), &unit_tasks(8)).unwrap();
        assert_eq!(engine.nodes()[0].current_load, 8.0);

        // Overload keeps latency finite and growing
        let latencies: Vec<f64> = report.records.iter().map(|r| r.latency_ms).collect();
        assert!(latencies.windows(2).all(|w| w[1] > w[0]));
        assert!(latencies.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_completion_window_releases_load() {
        let config = EngineConfig {
            completion_window: Some(2),
            ..EngineConfig::default()
        };
        let mut engine = engine(two_nodes()).with_config(config);
        engine.evaluate(&mut Fixed(0), &unit_tasks(10)).unwrap();
        assert_eq!(engine.nodes()[0].current_load, 2.0);
    }

    #[test]
    fn test_rule_uses_edge_until_threshold() {
        let mut engine = engine(two_nodes());
        let mut rule = RuleBasedOrchestrator::new(0.8).unwrap();
        let report = engine.evaluate(&mut rule, &unit_tasks(6)).unwrap();

        let kinds: Vec<NodeKind> = report.records.iter().map(|r| r.node_kind).collect();
        assert_eq!(&kinds[..4], &[NodeKind::Edge; 4]);
        assert_eq!(&kinds[4..], &[NodeKind::Cloud; 2]);
        assert!((report.edge_share() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_train_updates_table_and_reports() {
        let reporter = Arc::new(Recording::default());
        let mut engine = engine(two_nodes()).with_reporter(reporter.clone());
        let mut q = QLearningOrchestrator::new(
            QLearningConfig::default(),
            engine.encoder().clone(),
            engine.action_count(),
            3,
        )
        .unwrap();
        let mut workload = FixedWorkload::new(unit_tasks(12));

        let summary = engine.train(&mut q, &mut workload, 4, 12).unwrap();
        assert_eq!(summary.episodes.len(), 4);
        assert!(!summary.stopped_early);
        assert_eq!(q.updates(), 48);
        assert!(q.table().visited_entries() > 0);
        assert_eq!(*reporter.episodes.lock().unwrap(), vec![0, 1, 2, 3]);

        let before = q.table().clone();
        engine.evaluate(&mut q, &unit_tasks(12)).unwrap();
        assert_eq!(q.table(), &before);
        assert_eq!(*reporter.evaluations.lock().unwrap(), vec!["q_learning"]);
    }

    #[test]
    fn test_train_until_stops_early() {
        let mut engine = engine(two_nodes());
        let mut q = QLearningOrchestrator::new(
            QLearningConfig::default(),
            engine.encoder().clone(),
            engine.action_count(),
            3,
        )
        .unwrap();
        let mut workload = FixedWorkload::new(unit_tasks(5));

        let summary = engine
            .train_until(&mut q, &mut workload, 10, 5, |episode| episode >= 3)
            .unwrap();
        assert_eq!(summary.episodes.len(), 3);
        assert!(summary.stopped_early);
    }

    #[test]
    fn test_compare_evaluates_each_policy() {
        let mut engine = engine(two_nodes());
        let mut rule = RuleBasedOrchestrator::new(0.8).unwrap();
        let mut cloud = Fixed(1);
        let tasks = unit_tasks(10);

        let mut policies: [&mut dyn Orchestrator; 2] = [&mut rule, &mut cloud];
        let report = engine.compare(&mut policies, &tasks).unwrap();
        assert_eq!(report.reports.len(), 2);
        assert_eq!(report.get("rule_based").unwrap().summary.count, 10);
        assert!(report.get("fixed").is_some());
        assert!(report.to_metrics().contains_key("rule_based.mean_latency_ms"));
    }
}
