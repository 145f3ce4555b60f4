//! State, Action, and Reward types plus the state encoder
//!
//! The encoder discretizes node loads and task attributes into a [`State`]
//! and maps every state onto a dense row index of the Q-table. The mapping is
//! mixed radix: per-node load buckets (node order, least significant first),
//! then task kind, then (optionally) task priority.

use serde::{Deserialize, Serialize};

use edgeplace_core::{Node, PlacementError, Priority, Result, Task, TaskKind};

/// Reward value from the environment
pub type Reward = f64;

/// Position of the chosen node in the engine's id-ordered node set
pub type Action = usize;

/// Version of the (state, action) -> (row, column) addressing scheme
pub const TABLE_LAYOUT_VERSION: u32 = 1;

/// Upper bound on Q-table rows, keeps a misconfigured encoder from allocating
/// gigabytes
const MAX_STATE_SPACE: usize = 1 << 22;

/// Discretized snapshot used as a Q-table key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// Load bucket per node, in node order
    pub load_buckets: Vec<usize>,

    /// Kind of the task about to be placed
    pub task_kind: TaskKind,

    /// Priority of the task, when the encoder tracks it
    pub priority: Option<Priority>,
}

/// State encoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Number of load-ratio buckets per node
    #[serde(default = "default_load_buckets")]
    pub load_buckets: usize,

    /// Whether task priority is part of the state
    #[serde(default)]
    pub include_priority: bool,
}

fn default_load_buckets() -> usize {
    4
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            load_buckets: default_load_buckets(),
            include_priority: false,
        }
    }
}

/// Describes the addressing scheme of a persisted table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    pub version: u32,
    pub load_buckets: usize,
    pub node_count: usize,
    pub task_kinds: usize,
    pub priorities: usize,
}

/// Maps (nodes, task) to a [`State`] and states to table rows
#[derive(Debug, Clone)]
pub struct StateEncoder {
    config: EncoderConfig,
    node_count: usize,
    state_space: usize,
}

impl StateEncoder {
    pub fn new(config: EncoderConfig, node_count: usize) -> Result<Self> {
        if config.load_buckets == 0 {
            return Err(PlacementError::Config(
                "encoder.load_buckets must be at least 1".to_string(),
            ));
        }
        if node_count == 0 {
            return Err(PlacementError::InvalidNodeSet(
                "encoder needs at least one node".to_string(),
            ));
        }

        let priorities = if config.include_priority {
            Priority::ALL.len()
        } else {
            1
        };
        let state_space = u32::try_from(node_count)
            .ok()
            .and_then(|n| config.load_buckets.checked_pow(n))
            .and_then(|s| s.checked_mul(TaskKind::ALL.len()))
            .and_then(|s| s.checked_mul(priorities))
            .filter(|&s| s <= MAX_STATE_SPACE)
            .ok_or_else(|| {
                PlacementError::Config(format!(
                    "state space of {} buckets over {} nodes is too large",
                    config.load_buckets, node_count
                ))
            })?;

        Ok(Self {
            config,
            node_count,
            state_space,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of distinct states, i.e. Q-table rows
    pub fn state_space_size(&self) -> usize {
        self.state_space
    }

    pub fn layout(&self) -> TableLayout {
        TableLayout {
            version: TABLE_LAYOUT_VERSION,
            load_buckets: self.config.load_buckets,
            node_count: self.node_count,
            task_kinds: TaskKind::ALL.len(),
            priorities: if self.config.include_priority {
                Priority::ALL.len()
            } else {
                1
            },
        }
    }

    /// Bucket of a load ratio; overloaded nodes land in the top bucket
    pub fn bucket(&self, ratio: f64) -> usize {
        if !ratio.is_finite() || ratio <= 0.0 {
            return 0;
        }
        let buckets = self.config.load_buckets;
        ((ratio * buckets as f64).floor() as usize).min(buckets - 1)
    }

    pub fn encode(&self, nodes: &[Node], task: &Task) -> Result<State> {
        if nodes.len() != self.node_count {
            return Err(PlacementError::InvalidNodeSet(format!(
                "encoder built for {} nodes, got {}",
                self.node_count,
                nodes.len()
            )));
        }

        Ok(State {
            load_buckets: nodes.iter().map(|n| self.bucket(n.load_ratio())).collect(),
            task_kind: task.kind,
            priority: self.config.include_priority.then_some(task.priority),
        })
    }

    /// Row index of a state
    pub fn index(&self, state: &State) -> Result<usize> {
        if state.load_buckets.len() != self.node_count {
            return Err(PlacementError::InvalidState(format!(
                "state has {} load buckets, encoder expects {}",
                state.load_buckets.len(),
                self.node_count
            )));
        }

        let buckets = self.config.load_buckets;
        let mut index = 0;
        let mut stride = 1;
        for &bucket in &state.load_buckets {
            if bucket >= buckets {
                return Err(PlacementError::InvalidState(format!(
                    "load bucket {bucket} out of range 0..{buckets}"
                )));
            }
            index += bucket * stride;
            stride *= buckets;
        }

        index += state.task_kind.index() * stride;
        stride *= TaskKind::ALL.len();

        match (self.config.include_priority, state.priority) {
            (true, Some(priority)) => index += priority.index() * stride,
            (false, None) => {}
            (true, None) => {
                return Err(PlacementError::InvalidState(
                    "state is missing the task priority".to_string(),
                ))
            }
            (false, Some(_)) => {
                return Err(PlacementError::InvalidState(
                    "state carries a priority the encoder does not track".to_string(),
                ))
            }
        }

        Ok(index)
    }

    /// Inverse of [`StateEncoder::index`]
    pub fn state_at(&self, index: usize) -> Result<State> {
        if index >= self.state_space {
            return Err(PlacementError::InvalidState(format!(
                "row {index} out of range 0..{}",
                self.state_space
            )));
        }

        let buckets = self.config.load_buckets;
        let mut rest = index;
        let mut load_buckets = Vec::with_capacity(self.node_count);
        for _ in 0..self.node_count {
            load_buckets.push(rest % buckets);
            rest /= buckets;
        }

        let kinds = TaskKind::ALL.len();
        let task_kind = TaskKind::from_index(rest % kinds)
            .ok_or_else(|| PlacementError::InvalidState(format!("bad row {index}")))?;
        rest /= kinds;

        let priority = if self.config.include_priority {
            Some(
                Priority::from_index(rest)
                    .ok_or_else(|| PlacementError::InvalidState(format!("bad row {index}")))?,
            )
        } else {
            None
        };

        Ok(State {
            load_buckets,
            task_kind,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> Vec<Node> {
        vec![Node::edge(0, 10.0, 5.0), Node::cloud(1, 100.0, 25.0)]
    }

    #[test]
    fn test_state_space_size() {
        let encoder = StateEncoder::new(EncoderConfig::default(), 2).unwrap();
        assert_eq!(encoder.state_space_size(), 4 * 4 * 3);

        let with_priority = EncoderConfig {
            load_buckets: 5,
            include_priority: true,
        };
        let encoder = StateEncoder::new(with_priority, 3).unwrap();
        assert_eq!(encoder.state_space_size(), 125 * 3 * 3);
    }

    #[test]
    fn test_bucket_edges() {
        let encoder = StateEncoder::new(EncoderConfig::default(), 1).unwrap();
        assert_eq!(encoder.bucket(0.0), 0);
        assert_eq!(encoder.bucket(0.24), 0);
        assert_eq!(encoder.bucket(0.25), 1);
        assert_eq!(encoder.bucket(0.99), 3);
        assert_eq!(encoder.bucket(1.0), 3);
        assert_eq!(encoder.bucket(7.5), 3);
        assert_eq!(encoder.bucket(f64::NAN), 0);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = StateEncoder::new(EncoderConfig::default(), 2).unwrap();
        let mut nodes = two_nodes();
        nodes[0].current_load = 6.0;
        nodes[1].current_load = 10.0;
        let task = Task::new(0, TaskKind::ARVR, 6.0).with_priority(Priority::High);

        let a = encoder.encode(&nodes, &task).unwrap();
        let b = encoder.encode(&nodes, &task).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.load_buckets, vec![2, 0]);
        assert_eq!(a.task_kind, TaskKind::ARVR);
        assert_eq!(a.priority, None);
    }

    #[test]
    fn test_encode_rejects_wrong_node_count() {
        let encoder = StateEncoder::new(EncoderConfig::default(), 2).unwrap();
        let task = Task::new(0, TaskKind::IoT, 1.0);
        assert!(matches!(
            encoder.encode(&two_nodes()[..1], &task),
            Err(PlacementError::InvalidNodeSet(_))
        ));
    }

    #[test]
    fn test_index_is_a_bijection() {
        let config = EncoderConfig {
            load_buckets: 3,
            include_priority: true,
        };
        let encoder = StateEncoder::new(config, 2).unwrap();
        for row in 0..encoder.state_space_size() {
            let state = encoder.state_at(row).unwrap();
            assert_eq!(encoder.index(&state).unwrap(), row);
        }
        assert!(encoder.state_at(encoder.state_space_size()).is_err());
    }

    #[test]
    fn test_index_rejects_foreign_states() {
        let encoder = StateEncoder::new(EncoderConfig::default(), 2).unwrap();
        let bad_bucket = State {
            load_buckets: vec![0, 9],
            task_kind: TaskKind::IoT,
            priority: None,
        };
        assert!(encoder.index(&bad_bucket).is_err());

        let unexpected_priority = State {
            load_buckets: vec![0, 0],
            task_kind: TaskKind::IoT,
            priority: Some(Priority::Low),
        };
        assert!(encoder.index(&unexpected_priority).is_err());
    }

    #[test]
    fn test_rejects_huge_state_space() {
        let config = EncoderConfig {
            load_buckets: 64,
            include_priority: false,
        };
        assert!(matches!(
            StateEncoder::new(config, 8),
            Err(PlacementError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_zero_buckets() {
        let config = EncoderConfig {
            load_buckets: 0,
            include_priority: false,
        };
        assert!(StateEncoder::new(config, 2).is_err());
    }

    #[test]
    fn test_state_serialization() {
        let state = State {
            load_buckets: vec![1, 3],
            task_kind: TaskKind::VANET,
            priority: Some(Priority::Medium),
        };
        let json = serde_json::to_string(&state).unwrap();
        let parsed: State = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
