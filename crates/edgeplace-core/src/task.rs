//! Task types

use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, Result};

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application class that produced the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Small sensor uploads
    IoT,
    /// Augmented/virtual reality frames
    ARVR,
    /// Vehicular network messages
    VANET,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::IoT, TaskKind::ARVR, TaskKind::VANET];

    /// Stable position used by the state encoder
    pub fn index(self) -> usize {
        match self {
            TaskKind::IoT => 0,
            TaskKind::ARVR => 1,
            TaskKind::VANET => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::IoT => write!(f, "IoT"),
            TaskKind::ARVR => write!(f, "ARVR"),
            TaskKind::VANET => write!(f, "VANET"),
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "IOT" => Ok(TaskKind::IoT),
            "ARVR" | "AR/VR" | "AR_VR" => Ok(TaskKind::ARVR),
            "VANET" => Ok(TaskKind::VANET),
            other => Err(PlacementError::InvalidTask(format!("unknown task kind: {other}"))),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn index(self) -> usize {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// A unit of work waiting for a placement decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Computational weight (MB for generated workloads)
    pub size: f64,
    #[serde(default)]
    pub priority: Priority,
    /// Informational only, never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<f64>,
    /// Position within the episode
    #[serde(default)]
    pub arrival_index: usize,
    /// Seconds since the workload started, when arrivals are timed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<f64>,
}

impl Task {
    pub fn new(id: u64, kind: TaskKind, size: f64) -> Self {
        Self {
            id: TaskId(id),
            kind,
            size,
            priority: Priority::default(),
            deadline: None,
            arrival_index: 0,
            arrival_time: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline_ms: f64) -> Self {
        self.deadline = Some(deadline_ms);
        self
    }

    pub fn with_arrival_index(mut self, index: usize) -> Self {
        self.arrival_index = index;
        self
    }

    pub fn with_arrival_time(mut self, seconds: f64) -> Self {
        self.arrival_time = Some(seconds);
        self
    }

    /// Load contributed to a node on admission
    pub fn weight(&self) -> f64 {
        self.size
    }

    /// Reject tasks that would make a placement decision meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(PlacementError::InvalidTask(format!(
                "task {} has non-positive size {}",
                self.id, self.size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new(7, TaskKind::ARVR, 8.5)
            .with_priority(Priority::High)
            .with_deadline(40.0)
            .with_arrival_index(3);

        assert_eq!(task.id, TaskId(7));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.deadline, Some(40.0));
        assert_eq!(task.arrival_index, 3);
        assert_eq!(task.weight(), 8.5);
    }

    #[test]
    fn test_validate_size() {
        assert!(Task::new(0, TaskKind::IoT, 1.0).validate().is_ok());
        assert!(Task::new(0, TaskKind::IoT, 0.0).validate().is_err());
        assert!(Task::new(0, TaskKind::IoT, -2.0).validate().is_err());
        assert!(Task::new(0, TaskKind::IoT, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_task_kind_index_roundtrip() {
        for kind in TaskKind::ALL {
            assert_eq!(TaskKind::from_index(kind.index()), Some(kind));
        }
        assert_eq!(TaskKind::from_index(3), None);
    }

    #[test]
    fn test_task_kind_parse() {
        assert_eq!("iot".parse::<TaskKind>().unwrap(), TaskKind::IoT);
        assert_eq!("ARVR".parse::<TaskKind>().unwrap(), TaskKind::ARVR);
        assert!(matches!(
            "video".parse::<TaskKind>(),
            Err(PlacementError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_task_serialization() {
        let task = Task::new(1, TaskKind::VANET, 3.25).with_priority(Priority::Low);
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"VANET\""));
        assert!(json.contains("\"low\""));

        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }
}
