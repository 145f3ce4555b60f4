//! Compute node types

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PlacementError, Result};
use crate::task::Task;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a node sits in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Close to the user: low propagation latency, small capacity
    Edge,
    /// Behind the backbone: high propagation latency, large capacity
    Cloud,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Edge => write!(f, "edge"),
            NodeKind::Cloud => write!(f, "cloud"),
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "edge" => Ok(NodeKind::Edge),
            "cloud" => Ok(NodeKind::Cloud),
            other => Err(PlacementError::Config(format!("unknown node kind: {other}"))),
        }
    }
}

/// A compute resource that tasks can be placed on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Load at which the node is considered saturated
    pub capacity: f64,
    /// Sum of the weights of admitted, not yet released tasks
    #[serde(default)]
    pub current_load: f64,
    /// Fixed propagation/access latency in milliseconds
    pub base_latency: f64,
}

impl Node {
    pub fn new(id: u32, kind: NodeKind, capacity: f64, base_latency: f64) -> Self {
        Self {
            id: NodeId(id),
            kind,
            capacity,
            current_load: 0.0,
            base_latency,
        }
    }

    pub fn edge(id: u32, capacity: f64, base_latency: f64) -> Self {
        Self::new(id, NodeKind::Edge, capacity, base_latency)
    }

    pub fn cloud(id: u32, capacity: f64, base_latency: f64) -> Self {
        Self::new(id, NodeKind::Cloud, capacity, base_latency)
    }

    /// Display name, e.g. `edge_0`
    pub fn name(&self) -> String {
        format!("{}_{}", self.kind, self.id)
    }

    /// Current load as a fraction of capacity (may exceed 1.0 when overloaded)
    pub fn load_ratio(&self) -> f64 {
        if self.capacity > 0.0 {
            self.current_load / self.capacity
        } else {
            0.0
        }
    }

    /// Called at the start of every episode
    pub fn reset_load(&mut self) {
        self.current_load = 0.0;
    }

    /// Admit a task. Admission is unconditional: an overloaded node degrades
    /// latency instead of rejecting work.
    pub fn admit(&mut self, task: &Task) {
        self.current_load += task.weight();
    }

    /// Release a completed task's weight
    pub fn release(&mut self, task: &Task) {
        self.current_load = (self.current_load - task.weight()).max(0.0);
    }
}

/// Check that a node set can be used for placement.
///
/// Empty sets, duplicate ids and non-positive capacities are rejected. A set
/// where edge nodes are not strictly faster and smaller than cloud nodes is
/// accepted with a warning, since it leaves the policy nothing to learn.
pub fn validate_nodes(nodes: &[Node]) -> Result<()> {
    if nodes.is_empty() {
        return Err(PlacementError::InvalidNodeSet("node set is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.id) {
            return Err(PlacementError::InvalidNodeSet(format!(
                "duplicate node id {}",
                node.id
            )));
        }
        if !node.capacity.is_finite() || node.capacity <= 0.0 {
            return Err(PlacementError::InvalidNodeSet(format!(
                "node {} has non-positive capacity {}",
                node.name(),
                node.capacity
            )));
        }
        if !node.base_latency.is_finite() || node.base_latency < 0.0 {
            return Err(PlacementError::InvalidNodeSet(format!(
                "node {} has invalid base latency {}",
                node.name(),
                node.base_latency
            )));
        }
    }

    let edges = nodes.iter().filter(|n| n.kind == NodeKind::Edge);
    for edge in edges {
        for cloud in nodes.iter().filter(|n| n.kind == NodeKind::Cloud) {
            if edge.base_latency >= cloud.base_latency || edge.capacity >= cloud.capacity {
                warn!(
                    "{} ({} ms, capacity {}) does not trade latency for capacity against {} ({} ms, capacity {})",
                    edge.name(),
                    edge.base_latency,
                    edge.capacity,
                    cloud.name(),
                    cloud.base_latency,
                    cloud.capacity
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    #[test]
    fn test_node_name() {
        assert_eq!(Node::edge(0, 5.0, 10.0).name(), "edge_0");
        assert_eq!(Node::cloud(3, 100.0, 50.0).name(), "cloud_3");
    }

    #[test]
    fn test_admit_and_reset() {
        let mut node = Node::edge(0, 5.0, 10.0);
        node.admit(&Task::new(0, TaskKind::IoT, 2.0));
        node.admit(&Task::new(1, TaskKind::IoT, 1.5));
        assert_eq!(node.current_load, 3.5);
        assert_eq!(node.load_ratio(), 0.7);

        node.reset_load();
        assert_eq!(node.current_load, 0.0);
    }

    #[test]
    fn test_admit_beyond_capacity() {
        let mut node = Node::edge(0, 2.0, 10.0);
        node.admit(&Task::new(0, TaskKind::ARVR, 5.0));
        assert!(node.load_ratio() > 1.0);
    }

    #[test]
    fn test_release_saturates_at_zero() {
        let mut node = Node::cloud(1, 100.0, 50.0);
        node.admit(&Task::new(0, TaskKind::VANET, 1.0));
        node.release(&Task::new(1, TaskKind::VANET, 4.0));
        assert_eq!(node.current_load, 0.0);
    }

    #[test]
    fn test_node_kind_parse() {
        assert_eq!("Edge".parse::<NodeKind>().unwrap(), NodeKind::Edge);
        assert_eq!("cloud".parse::<NodeKind>().unwrap(), NodeKind::Cloud);
        assert!("fog".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        assert!(matches!(
            validate_nodes(&[]),
            Err(PlacementError::InvalidNodeSet(_))
        ));
        let nodes = vec![Node::edge(0, 5.0, 10.0), Node::cloud(0, 100.0, 50.0)];
        assert!(matches!(
            validate_nodes(&nodes),
            Err(PlacementError::InvalidNodeSet(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let nodes = vec![Node::edge(0, 0.0, 10.0)];
        assert!(validate_nodes(&nodes).is_err());
    }

    #[test]
    fn test_validate_accepts_tradeoff() {
        let nodes = vec![Node::edge(0, 5.0, 10.0), Node::cloud(1, 100.0, 50.0)];
        assert!(validate_nodes(&nodes).is_ok());
    }
}
