//! Baseline orchestrators: uniform random and load-threshold rule

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use edgeplace_core::{Node, NodeKind, PlacementError, Result, Task};

use crate::algorithm::Orchestrator;
use crate::state::{Action, State};

fn ensure_nodes(nodes: &[Node]) -> Result<()> {
    if nodes.is_empty() {
        return Err(PlacementError::InvalidNodeSet(
            "cannot place a task on an empty node set".to_string(),
        ));
    }
    Ok(())
}

/// Picks a node uniformly at random from its own seeded stream
pub struct RandomOrchestrator {
    rng: ChaCha8Rng,
}

impl RandomOrchestrator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Orchestrator for RandomOrchestrator {
    fn name(&self) -> &str {
        "random"
    }

    fn decide(&mut self, nodes: &[Node], _state: &State, _task: &Task) -> Result<Action> {
        ensure_nodes(nodes)?;
        Ok(self.rng.gen_range(0..nodes.len()))
    }
}

/// Rule-based policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Edge nodes accept work while their load ratio is below this
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.8
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Edge first while it has headroom, then the least loaded cloud node.
///
/// Holds no mutable state: the choice depends only on the node loads passed in.
#[derive(Debug, Clone)]
pub struct RuleBasedOrchestrator {
    threshold: f64,
}

impl RuleBasedOrchestrator {
    pub fn new(threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(PlacementError::Config(format!(
                "rule threshold must be a non-negative number, got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn from_config(config: &RuleConfig) -> Result<Self> {
        Self::new(config.threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Position of the least loaded node matching `kind` (any kind if `None`);
    /// ties go to the lowest id
    fn least_loaded(nodes: &[Node], kind: Option<NodeKind>) -> Option<Action> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| kind.map_or(true, |k| n.kind == k))
            .min_by(|(_, a), (_, b)| {
                a.load_ratio()
                    .total_cmp(&b.load_ratio())
                    .then(a.id.cmp(&b.id))
            })
            .map(|(i, _)| i)
    }

    pub fn choose(&self, nodes: &[Node]) -> Result<Action> {
        ensure_nodes(nodes)?;

        let mut edges: Vec<(usize, &Node)> = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Edge)
            .collect();
        edges.sort_by_key(|(_, n)| n.id);

        if let Some((i, _)) = edges
            .iter()
            .find(|(_, n)| n.load_ratio() < self.threshold)
        {
            return Ok(*i);
        }

        Self::least_loaded(nodes, Some(NodeKind::Cloud))
            .or_else(|| Self::least_loaded(nodes, None))
            .ok_or_else(|| PlacementError::InvalidNodeSet("no node available".to_string()))
    }
}

impl Orchestrator for RuleBasedOrchestrator {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn decide(&mut self, nodes: &[Node], _state: &State, _task: &Task) -> Result<Action> {
        self.choose(nodes)
    }
}
