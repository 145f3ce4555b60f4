//! Transition and placement records

use serde::{Deserialize, Serialize};

use edgeplace_core::{NodeId, NodeKind, Priority, Task, TaskId, TaskKind};

use crate::state::{Action, Reward, State};

/// A single experience tuple (s, a, r, s', done)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub state: State,
    pub action: Action,
    pub reward: Reward,
    pub next_state: Option<State>,
    /// Last placement of the episode; the update does not bootstrap
    pub done: bool,
}

impl Experience {
    /// Create a new experience
    pub fn new(
        state: State,
        action: Action,
        reward: Reward,
        next_state: Option<State>,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// Outcome of placing one task, as reported for evaluation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub policy: String,
    pub task_id: TaskId,
    pub task_kind: TaskKind,
    pub priority: Priority,
    pub size: f64,
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub latency_ms: f64,
    pub reward: Reward,
}

impl PlacementRecord {
    pub fn new(
        policy: &str,
        task: &Task,
        node_id: NodeId,
        node_kind: NodeKind,
        latency_ms: f64,
        reward: Reward,
    ) -> Self {
        Self {
            policy: policy.to_string(),
            task_id: task.id,
            task_kind: task.kind,
            priority: task.priority,
            size: task.size,
            node_id,
            node_kind,
            latency_ms,
            reward,
        }
    }
}
