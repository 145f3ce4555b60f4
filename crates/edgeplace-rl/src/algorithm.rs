//! Orchestrator trait and the tabular Q-learning policy

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use edgeplace_core::{Node, PlacementError, Result, Task};

use crate::experience::Experience;
use crate::q_table::{QTable, QTableSnapshot};
use crate::state::{Action, Reward, State, StateEncoder};

/// Whether a policy is learning or being measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Train,
    /// No exploration, no table updates
    Evaluate,
}

/// Trait for placement policies
pub trait Orchestrator: Send {
    /// Policy name
    fn name(&self) -> &str;

    /// Pick a node (by position in `nodes`) for `task`
    fn decide(&mut self, nodes: &[Node], state: &State, task: &Task) -> Result<Action>;

    /// Learn from a completed placement
    fn update(&mut self, _experience: &Experience) -> Result<()> {
        Ok(())
    }

    /// Called after every training episode
    fn end_episode(&mut self, _episode: usize, _total_episodes: usize) {}

    fn set_mode(&mut self, _mode: Mode) {}

    /// Exploration rate currently in effect, for learning policies
    fn epsilon(&self) -> Option<f64> {
        None
    }
}

/// Turns a latency into a reward: `-scale * latency`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardFn {
    scale: f64,
}

impl RewardFn {
    pub fn new(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PlacementError::Config(format!(
                "reward scale must be positive, got {scale}"
            )));
        }
        Ok(Self { scale })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn reward(&self, latency_ms: f64) -> Reward {
        -self.scale * latency_ms
    }
}

impl Default for RewardFn {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// Shape of the epsilon decay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayKind {
    Linear,
    #[default]
    Exponential,
}

/// Epsilon per episode: `start` at episode 0, `floor` in the final episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    pub start: f64,
    pub floor: f64,
    pub decay: DecayKind,
    /// Per-episode factor for exponential decay, in (0, 1)
    pub rate: f64,
}

impl EpsilonSchedule {
    /// Epsilon to use for `episode` out of `total_episodes`.
    ///
    /// Non-increasing in `episode`, never below `floor`, and equal to `floor`
    /// from the last episode (`total_episodes - 1`) on. A single-episode run
    /// stays at `start`.
    pub fn epsilon_for(&self, episode: usize, total_episodes: usize) -> f64 {
        let last = total_episodes.saturating_sub(1);
        if last == 0 {
            return self.start;
        }
        let e = episode.min(last) as f64;
        let total = last as f64;
        let span = self.start - self.floor;

        let linear = self.start - span * e / total;
        let value = match self.decay {
            DecayKind::Linear => linear,
            DecayKind::Exponential => {
                let end = self.rate.powf(total);
                let denom = 1.0 - end;
                if denom <= f64::EPSILON {
                    linear
                } else {
                    self.floor + span * (self.rate.powf(e) - end) / denom
                }
            }
        };
        value.clamp(self.floor, self.start)
    }
}

/// How the Q-table starts out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableInit {
    #[default]
    Zeros,
    Uniform,
}

/// Q-learning hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QLearningConfig {
    /// Learning rate, in (0, 1]
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Discount factor, in [0, 1]
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,

    #[serde(default = "default_epsilon_floor")]
    pub epsilon_floor: f64,

    #[serde(default)]
    pub decay: DecayKind,

    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Multiplier applied to latency to form the (negative) reward
    #[serde(default = "default_reward_scale")]
    pub reward_scale: f64,

    #[serde(default)]
    pub init: TableInit,

    /// Bound of the uniform initial values
    #[serde(default = "default_init_scale")]
    pub init_scale: f64,
}

fn default_alpha() -> f64 {
    0.5
}
fn default_gamma() -> f64 {
    0.9
}
fn default_epsilon_start() -> f64 {
    0.3
}
fn default_epsilon_floor() -> f64 {
    0.05
}
fn default_decay_rate() -> f64 {
    0.99
}
fn default_reward_scale() -> f64 {
    1.0
}
fn default_init_scale() -> f64 {
    0.01
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            gamma: default_gamma(),
            epsilon_start: default_epsilon_start(),
            epsilon_floor: default_epsilon_floor(),
            decay: DecayKind::default(),
            decay_rate: default_decay_rate(),
            reward_scale: default_reward_scale(),
            init: TableInit::default(),
            init_scale: default_init_scale(),
        }
    }
}

impl QLearningConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(PlacementError::Config(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(PlacementError::Config(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon_start)
            || !(0.0..=1.0).contains(&self.epsilon_floor)
            || self.epsilon_floor > self.epsilon_start
        {
            return Err(PlacementError::Config(format!(
                "need 0 <= epsilon_floor ({}) <= epsilon_start ({}) <= 1",
                self.epsilon_floor, self.epsilon_start
            )));
        }
        if self.decay == DecayKind::Exponential && !(self.decay_rate > 0.0 && self.decay_rate < 1.0)
        {
            return Err(PlacementError::Config(format!(
                "decay_rate must be in (0, 1), got {}",
                self.decay_rate
            )));
        }
        if !self.init_scale.is_finite() || self.init_scale < 0.0 {
            return Err(PlacementError::Config(format!(
                "init_scale must be non-negative, got {}",
                self.init_scale
            )));
        }
        RewardFn::new(self.reward_scale)?;
        Ok(())
    }

    pub fn schedule(&self) -> EpsilonSchedule {
        EpsilonSchedule {
            start: self.epsilon_start,
            floor: self.epsilon_floor,
            decay: self.decay,
            rate: self.decay_rate,
        }
    }

    pub fn reward_fn(&self) -> Result<RewardFn> {
        RewardFn::new(self.reward_scale)
    }
}

/// Tabular Q-learning with epsilon-greedy exploration
pub struct QLearningOrchestrator {
    config: QLearningConfig,
    encoder: StateEncoder,
    table: QTable,
    schedule: EpsilonSchedule,
    epsilon: f64,
    mode: Mode,
    rng: ChaCha8Rng,
    updates: u64,
}

impl QLearningOrchestrator {
    /// Fresh table for `action_count` nodes
    pub fn new(
        config: QLearningConfig,
        encoder: StateEncoder,
        action_count: usize,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if action_count == 0 {
            return Err(PlacementError::InvalidNodeSet(
                "Q-learning needs at least one action".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rows = encoder.state_space_size();
        let table = match config.init {
            TableInit::Zeros => QTable::zeros(rows, action_count),
            TableInit::Uniform => QTable::uniform(rows, action_count, config.init_scale, &mut rng),
        };

        Ok(Self::with_table(config, encoder, table, rng))
    }

    /// Resume from a persisted table
    pub fn from_snapshot(
        config: QLearningConfig,
        encoder: StateEncoder,
        snapshot: &QTableSnapshot,
        action_count: usize,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        let table = snapshot.restore(
            &encoder.layout(),
            encoder.state_space_size(),
            action_count,
        )?;
        Ok(Self::with_table(
            config,
            encoder,
            table,
            ChaCha8Rng::seed_from_u64(seed),
        ))
    }

    fn with_table(
        config: QLearningConfig,
        encoder: StateEncoder,
        table: QTable,
        rng: ChaCha8Rng,
    ) -> Self {
        let schedule = config.schedule();
        Self {
            epsilon: schedule.start,
            config,
            encoder,
            table,
            schedule,
            mode: Mode::Train,
            rng,
            updates: 0,
        }
    }

    pub fn config(&self) -> &QLearningConfig {
        &self.config
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn encoder(&self) -> &StateEncoder {
        &self.encoder
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Export the table for persistence
    pub fn snapshot(&self) -> QTableSnapshot {
        QTableSnapshot::new(self.encoder.layout(), &self.table)
    }

    /// Exploitation-only choice for a state
    pub fn greedy_action(&self, state: &State) -> Result<Action> {
        let row = self.encoder.index(state)?;
        self.table
            .best_action(row)
            .ok_or_else(|| PlacementError::InvalidState(format!("no actions for row {row}")))
    }

    fn current_epsilon(&self) -> f64 {
        match self.mode {
            Mode::Train => self.epsilon,
            Mode::Evaluate => 0.0,
        }
    }
}

impl Orchestrator for QLearningOrchestrator {
    fn name(&self) -> &str {
        "q_learning"
    }

    fn decide(&mut self, nodes: &[Node], state: &State, _task: &Task) -> Result<Action> {
        if nodes.is_empty() {
            return Err(PlacementError::InvalidNodeSet(
                "cannot place a task on an empty node set".to_string(),
            ));
        }
        if nodes.len() != self.table.cols() {
            return Err(PlacementError::InvalidNodeSet(format!(
                "table has {} actions, node set has {} nodes",
                self.table.cols(),
                nodes.len()
            )));
        }

        let epsilon = self.current_epsilon();
        if epsilon > 0.0 && self.rng.gen::<f64>() < epsilon {
            // Exploring
            Ok(self.rng.gen_range(0..nodes.len()))
        } else {
            self.greedy_action(state)
        }
    }

    fn update(&mut self, experience: &Experience) -> Result<()> {
        if self.mode == Mode::Evaluate {
            debug!("Table frozen, ignoring update");
            return Ok(());
        }
        if !experience.reward.is_finite() {
            return Err(PlacementError::InvalidReward(experience.reward));
        }

        let row = self.encoder.index(&experience.state)?;
        let current = self.table.get(row, experience.action).ok_or_else(|| {
            PlacementError::InvalidState(format!(
                "action {} outside the table's {} actions",
                experience.action,
                self.table.cols()
            ))
        })?;

        let target = match (&experience.next_state, experience.done) {
            (Some(next), false) => {
                let next_row = self.encoder.index(next)?;
                let max_next = self.table.max_value(next_row).unwrap_or(0.0);
                experience.reward + self.config.gamma * max_next
            }
            _ => experience.reward,
        };

        let updated = current + self.config.alpha * (target - current);
        self.table.set(row, experience.action, updated)?;
        self.updates += 1;
        Ok(())
    }

    fn end_episode(&mut self, episode: usize, total_episodes: usize) {
        let next = self.schedule.epsilon_for(episode + 1, total_episodes);
        self.epsilon = next.min(self.epsilon);
        debug!(
            "Episode {} done, epsilon now {:.4}",
            episode + 1,
            self.epsilon
        );
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn epsilon(&self) -> Option<f64> {
        Some(self.current_epsilon())
    }
}
