//! Latency simulators
//!
//! A simulator turns a (node, task) pair into an end-to-end latency estimate
//! in milliseconds. Every variant keeps latency monotone non-decreasing in
//! node load and in task size, so the learner sees a consistent signal.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, Result};
use crate::node::{Node, NodeKind};
use crate::task::Task;

/// Smallest denominator the congestion penalty may divide by
const MIN_CONGESTION_EPSILON: f64 = 1e-6;

/// Trait for latency models
pub trait LatencySimulator: Send {
    /// Simulator name
    fn name(&self) -> &str;

    /// Estimated latency in milliseconds for running `task` on `node` at its
    /// current load. Never negative.
    fn estimate_latency(&mut self, node: &Node, task: &Task) -> f64;
}

/// Deterministic analytic model: propagation + queueing blow-up + size cost
#[derive(Debug, Clone)]
pub struct SimpleSimulator {
    congestion_scale_ms: f64,
    congestion_epsilon: f64,
    size_penalty_ms: f64,
}

impl SimpleSimulator {
    pub fn new(congestion_scale_ms: f64, congestion_epsilon: f64, size_penalty_ms: f64) -> Self {
        Self {
            congestion_scale_ms: congestion_scale_ms.max(0.0),
            congestion_epsilon: congestion_epsilon.max(MIN_CONGESTION_EPSILON),
            size_penalty_ms: size_penalty_ms.max(0.0),
        }
    }

    /// Queueing penalty, `scale * r / (max(1 - r, 0) + eps)` with `r = load / capacity`.
    ///
    /// Past saturation the denominator stays at `eps` and the penalty keeps
    /// growing linearly with the ratio.
    pub fn congestion_penalty(&self, load: f64, capacity: f64) -> f64 {
        if capacity <= 0.0 {
            return 0.0;
        }
        let ratio = load.max(0.0) / capacity;
        let headroom = (1.0 - ratio).max(0.0) + self.congestion_epsilon;
        self.congestion_scale_ms * ratio / headroom
    }

    pub fn size_penalty(&self, size: f64) -> f64 {
        self.size_penalty_ms * size.max(0.0)
    }
}

impl Default for SimpleSimulator {
    fn default() -> Self {
        let config = SimulatorConfig::default();
        Self::new(
            config.congestion_scale_ms,
            config.congestion_epsilon,
            config.size_penalty_ms,
        )
    }
}

impl LatencySimulator for SimpleSimulator {
    fn name(&self) -> &str {
        "simple"
    }

    fn estimate_latency(&mut self, node: &Node, task: &Task) -> f64 {
        let latency = node.base_latency
            + self.congestion_penalty(node.current_load, node.capacity)
            + self.size_penalty(task.size);
        latency.max(0.0)
    }
}

/// Analytic model plus bounded noise and a cloud backbone hop.
///
/// All randomness comes from a seeded ChaCha8 stream, so two simulators built
/// with the same seed produce the same latencies for the same call sequence.
pub struct JitterSimulator {
    inner: SimpleSimulator,
    jitter_ms: f64,
    backbone_min_ms: f64,
    backbone_max_ms: f64,
    rng: ChaCha8Rng,
}

impl JitterSimulator {
    pub fn new(
        inner: SimpleSimulator,
        jitter_ms: f64,
        backbone_min_ms: f64,
        backbone_max_ms: f64,
        seed: u64,
    ) -> Self {
        let backbone_min_ms = backbone_min_ms.max(0.0);
        Self {
            inner,
            jitter_ms: jitter_ms.max(0.0),
            backbone_min_ms,
            backbone_max_ms: backbone_max_ms.max(backbone_min_ms),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn jitter(&mut self) -> f64 {
        if self.jitter_ms > 0.0 {
            self.rng.gen_range(-self.jitter_ms..=self.jitter_ms)
        } else {
            0.0
        }
    }

    fn backbone(&mut self) -> f64 {
        if self.backbone_max_ms > self.backbone_min_ms {
            self.rng.gen_range(self.backbone_min_ms..=self.backbone_max_ms)
        } else {
            self.backbone_min_ms
        }
    }
}

impl LatencySimulator for JitterSimulator {
    fn name(&self) -> &str {
        "jitter"
    }

    fn estimate_latency(&mut self, node: &Node, task: &Task) -> f64 {
        let base = self.inner.estimate_latency(node, task);
        let noise = self.jitter();
        let backbone = match node.kind {
            NodeKind::Cloud => self.backbone(),
            NodeKind::Edge => 0.0,
        };
        (base + noise + backbone).max(0.0)
    }
}

/// Available simulator variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorKind {
    #[default]
    Simple,
    Jitter,
}

impl std::str::FromStr for SimulatorKind {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(SimulatorKind::Simple),
            "jitter" | "5g" => Ok(SimulatorKind::Jitter),
            other => Err(PlacementError::Config(format!(
                "unknown simulator '{other}', available: simple, jitter"
            ))),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub kind: SimulatorKind,

    /// Penalty scale for queueing as load approaches capacity
    #[serde(default = "default_congestion_scale_ms")]
    pub congestion_scale_ms: f64,

    /// Denominator floor for the congestion penalty
    #[serde(default = "default_congestion_epsilon")]
    pub congestion_epsilon: f64,

    /// Milliseconds per unit of task size
    #[serde(default = "default_size_penalty_ms")]
    pub size_penalty_ms: f64,

    /// Bound of the symmetric uniform jitter (jitter simulator only)
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: f64,

    #[serde(default = "default_backbone_min_ms")]
    pub backbone_min_ms: f64,

    #[serde(default = "default_backbone_max_ms")]
    pub backbone_max_ms: f64,
}

fn default_congestion_scale_ms() -> f64 {
    2.0
}
fn default_congestion_epsilon() -> f64 {
    0.05
}
fn default_size_penalty_ms() -> f64 {
    0.6
}
fn default_jitter_ms() -> f64 {
    2.0
}
fn default_backbone_min_ms() -> f64 {
    10.0
}
fn default_backbone_max_ms() -> f64 {
    30.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            kind: SimulatorKind::default(),
            congestion_scale_ms: default_congestion_scale_ms(),
            congestion_epsilon: default_congestion_epsilon(),
            size_penalty_ms: default_size_penalty_ms(),
            jitter_ms: default_jitter_ms(),
            backbone_min_ms: default_backbone_min_ms(),
            backbone_max_ms: default_backbone_max_ms(),
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("congestion_scale_ms", self.congestion_scale_ms),
            ("size_penalty_ms", self.size_penalty_ms),
            ("jitter_ms", self.jitter_ms),
            ("backbone_min_ms", self.backbone_min_ms),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PlacementError::Config(format!(
                    "simulator.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !self.congestion_epsilon.is_finite() || self.congestion_epsilon <= 0.0 {
            return Err(PlacementError::Config(format!(
                "simulator.congestion_epsilon must be positive, got {}",
                self.congestion_epsilon
            )));
        }
        if self.backbone_max_ms < self.backbone_min_ms {
            return Err(PlacementError::Config(format!(
                "simulator.backbone_max_ms ({}) is below backbone_min_ms ({})",
                self.backbone_max_ms, self.backbone_min_ms
            )));
        }
        Ok(())
    }

    /// Build the configured simulator; `seed` drives any stochastic component
    pub fn build(&self, seed: u64) -> Result<Box<dyn LatencySimulator>> {
        self.validate()?;
        let simple = SimpleSimulator::new(
            self.congestion_scale_ms,
            self.congestion_epsilon,
            self.size_penalty_ms,
        );
        Ok(match self.kind {
            SimulatorKind::Simple => Box::new(simple),
            SimulatorKind::Jitter => Box::new(JitterSimulator::new(
                simple,
                self.jitter_ms,
                self.backbone_min_ms,
                self.backbone_max_ms,
                seed,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    #[test]
    fn test_idle_latency_is_base_plus_size() {
        let mut sim = SimpleSimulator::new(2.0, 0.05, 0.5);
        let node = Node::edge(0, 10.0, 5.0);
        let task = Task::new(0, TaskKind::IoT, 2.0);
        assert!((sim.estimate_latency(&node, &task) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_congestion_grows_super_linearly() {
        let sim = SimpleSimulator::new(1.0, 0.05, 0.0);
        let quarter = sim.congestion_penalty(2.5, 10.0);
        let half = sim.congestion_penalty(5.0, 10.0);
        let nearly_full = sim.congestion_penalty(9.5, 10.0);
        assert!(half > 2.0 * quarter);
        assert!(nearly_full > 10.0 * half);
    }

    #[test]
    fn test_congestion_is_finite_at_and_past_capacity() {
        let sim = SimpleSimulator::new(1.0, 0.05, 0.0);
        let full = sim.congestion_penalty(10.0, 10.0);
        let over = sim.congestion_penalty(15.0, 10.0);
        assert!(full.is_finite());
        assert!(over.is_finite());
        assert!(over > full);
    }

    #[test]
    fn test_zero_capacity_does_not_divide() {
        let sim = SimpleSimulator::default();
        assert_eq!(sim.congestion_penalty(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_jitter_is_bounded_and_seeded() {
        let node = Node::edge(0, 10.0, 5.0);
        let task = Task::new(0, TaskKind::IoT, 1.0);
        let base = SimpleSimulator::new(2.0, 0.05, 0.6).estimate_latency(&node, &task);

        let mut a = JitterSimulator::new(SimpleSimulator::new(2.0, 0.05, 0.6), 1.5, 10.0, 30.0, 7);
        let mut b = JitterSimulator::new(SimpleSimulator::new(2.0, 0.05, 0.6), 1.5, 10.0, 30.0, 7);
        for _ in 0..100 {
            let la = a.estimate_latency(&node, &task);
            let lb = b.estimate_latency(&node, &task);
            assert_eq!(la, lb);
            assert!((la - base).abs() <= 1.5 + 1e-9);
        }
    }

    #[test]
    fn test_jitter_adds_backbone_for_cloud() {
        let node = Node::cloud(1, 100.0, 25.0);
        let task = Task::new(0, TaskKind::VANET, 1.0);
        let mut sim = JitterSimulator::new(SimpleSimulator::new(2.0, 0.05, 0.6), 0.0, 10.0, 30.0, 1);
        for _ in 0..50 {
            let latency = sim.estimate_latency(&node, &task);
            assert!(latency >= 25.0 + 10.0);
            assert!(latency <= 25.0 + 30.0 + 0.6 + 1.0);
        }
    }

    #[test]
    fn test_simulator_kind_parse() {
        assert_eq!("simple".parse::<SimulatorKind>().unwrap(), SimulatorKind::Simple);
        assert_eq!("Jitter".parse::<SimulatorKind>().unwrap(), SimulatorKind::Jitter);
        assert!("ns3".parse::<SimulatorKind>().is_err());
    }

    #[test]
    fn test_config_build() {
        let config = SimulatorConfig::default();
        assert_eq!(config.build(0).unwrap().name(), "simple");

        let jitter = SimulatorConfig {
            kind: SimulatorKind::Jitter,
            ..SimulatorConfig::default()
        };
        assert_eq!(jitter.build(0).unwrap().name(), "jitter");
    }

    #[test]
    fn test_config_rejects_bad_epsilon() {
        let config = SimulatorConfig {
            congestion_epsilon: 0.0,
            ..SimulatorConfig::default()
        };
        assert!(matches!(config.build(0), Err(PlacementError::Config(_))));
    }
}
