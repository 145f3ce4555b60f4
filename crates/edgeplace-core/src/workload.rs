//! Workload sources
//!
//! The placement engine pulls tasks through [`WorkloadSource`]. Two sources
//! ship with the crate: a seeded synthetic generator modelled on 5G-era
//! application mixes, and a fixed task list that can be read from JSON or CSV.

use std::path::Path;

use chrono::NaiveDateTime;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PlacementError, Result};
use crate::task::{Priority, Task, TaskKind};

/// Ordered, restartable supply of tasks
pub trait WorkloadSource {
    /// Next `count` tasks in arrival order, `arrival_index` numbered from 0
    fn produce(&mut self, count: usize) -> Result<Vec<Task>>;

    /// Rewind so the following `produce` calls repeat the sequence
    fn restart(&mut self);
}

/// Size range and priority mix of one application class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppProfile {
    pub kind: TaskKind,
    pub size_min: f64,
    pub size_max: f64,
    /// Weights for low, medium, high
    pub priority_weights: [f64; 3],
}

impl AppProfile {
    pub fn defaults() -> Vec<AppProfile> {
        vec![
            AppProfile {
                kind: TaskKind::IoT,
                size_min: 0.5,
                size_max: 3.0,
                priority_weights: [0.6, 0.3, 0.1],
            },
            AppProfile {
                kind: TaskKind::ARVR,
                size_min: 5.0,
                size_max: 12.0,
                priority_weights: [0.2, 0.5, 0.3],
            },
            AppProfile {
                kind: TaskKind::VANET,
                size_min: 2.0,
                size_max: 8.0,
                priority_weights: [0.3, 0.5, 0.2],
            },
        ]
    }
}

/// Seeded synthetic workload generator
pub struct WorkloadGenerator {
    seed: u64,
    profiles: Vec<AppProfile>,
    priority_dists: Vec<WeightedIndex<f64>>,
    inter_arrival: Option<Exp<f64>>,
    rng: ChaCha8Rng,
    next_id: u64,
    clock: f64,
}

impl WorkloadGenerator {
    /// Generator with the default IoT / ARVR / VANET mix
    pub fn new(seed: u64) -> Result<Self> {
        Self::with_profiles(seed, AppProfile::defaults())
    }

    pub fn with_profiles(seed: u64, profiles: Vec<AppProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(PlacementError::Config(
                "workload needs at least one app profile".to_string(),
            ));
        }

        let mut priority_dists = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            if !(profile.size_min > 0.0 && profile.size_max >= profile.size_min) {
                return Err(PlacementError::Config(format!(
                    "invalid size range [{}, {}) for {}",
                    profile.size_min, profile.size_max, profile.kind
                )));
            }
            let dist = WeightedIndex::new(profile.priority_weights).map_err(|e| {
                PlacementError::Config(format!("priority weights for {}: {e}", profile.kind))
            })?;
            priority_dists.push(dist);
        }

        Ok(Self {
            seed,
            profiles,
            priority_dists,
            inter_arrival: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 0,
            clock: 0.0,
        })
    }

    /// Stamp tasks with Poisson arrival times at `lambda` tasks per second
    pub fn with_poisson_arrivals(mut self, lambda: f64) -> Result<Self> {
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(PlacementError::Config(format!(
                "poisson_lambda must be positive, got {lambda}"
            )));
        }
        let exp = Exp::new(lambda).map_err(|e| {
            PlacementError::Config(format!("poisson_lambda must be positive ({e})"))
        })?;
        self.inter_arrival = Some(exp);
        Ok(self)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn generate_task(&mut self, arrival_index: usize) -> Task {
        let profile_idx = self.rng.gen_range(0..self.profiles.len());
        let profile = &self.profiles[profile_idx];

        let size = if profile.size_max > profile.size_min {
            self.rng.gen_range(profile.size_min..profile.size_max)
        } else {
            profile.size_min
        };
        // Three decimals, never rounded down to zero
        let size = ((size * 1000.0).round() / 1000.0).max(0.001);

        let priority = Priority::from_index(self.priority_dists[profile_idx].sample(&mut self.rng))
            .unwrap_or_default();

        let mut task = Task::new(self.next_id, profile.kind, size)
            .with_priority(priority)
            .with_arrival_index(arrival_index);

        if let Some(exp) = &self.inter_arrival {
            self.clock += exp.sample(&mut self.rng);
            task = task.with_arrival_time(self.clock);
        }

        self.next_id += 1;
        task
    }
}

impl WorkloadSource for WorkloadGenerator {
    fn produce(&mut self, count: usize) -> Result<Vec<Task>> {
        let tasks: Vec<Task> = (0..count).map(|i| self.generate_task(i)).collect();
        debug!("Generated {} tasks (next id {})", tasks.len(), self.next_id);
        Ok(tasks)
    }

    fn restart(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.next_id = 0;
        self.clock = 0.0;
    }
}

/// Replays a fixed task list, wrapping around when exhausted
#[derive(Debug, Clone)]
pub struct FixedWorkload {
    tasks: Vec<Task>,
    cursor: usize,
}

/// Wall-clock format of the `timestamp` column in CSV exports
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// On-disk task record; tolerant of the column names used by older exports
#[derive(Debug, Deserialize)]
struct TaskRecord {
    #[serde(default, alias = "task_id")]
    id: Option<u64>,
    #[serde(default, alias = "app_type")]
    kind: Option<String>,
    #[serde(default, alias = "size_mb")]
    size: Option<f64>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    deadline: Option<f64>,
    #[serde(default)]
    arrival_time: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl TaskRecord {
    /// `origin` is the first timestamp seen; later timestamps become
    /// arrival times in seconds relative to it.
    fn into_task(self, position: usize, origin: &mut Option<NaiveDateTime>) -> Result<Task> {
        let id = self.id.unwrap_or(position as u64);
        let kind = self
            .kind
            .ok_or_else(|| PlacementError::InvalidTask(format!("task {id} has no kind")))?
            .parse::<TaskKind>()?;
        let size = self
            .size
            .ok_or_else(|| PlacementError::InvalidTask(format!("task {id} has no size")))?;

        let mut task = Task::new(id, kind, size)
            .with_priority(self.priority.unwrap_or_default())
            .with_arrival_index(position);
        task.deadline = self.deadline;
        task.arrival_time = match (self.arrival_time, self.timestamp.as_deref()) {
            (Some(seconds), _) => Some(seconds),
            (None, Some(stamp)) => {
                let at = NaiveDateTime::parse_from_str(stamp.trim(), TIMESTAMP_FORMAT)
                    .map_err(|e| {
                        PlacementError::InvalidTask(format!(
                            "task {id} has an unreadable timestamp {stamp:?}: {e}"
                        ))
                    })?;
                let start = *origin.get_or_insert(at);
                Some((at - start).num_milliseconds() as f64 / 1000.0)
            }
            (None, None) => None,
        };
        task.validate()?;
        Ok(task)
    }
}

impl FixedWorkload {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks, cursor: 0 }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Read a task file, picking the format from the extension (`.csv`,
    /// anything else is JSON)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            Self::load_csv(path)
        } else {
            Self::load_json(path)
        }
    }

    /// Read a JSON array of task records
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let records: Vec<TaskRecord> = serde_json::from_str(&content)?;
        let tasks = Self::from_records(records)?;
        info!("Loaded {} tasks from {:?}", tasks.len(), path);
        Ok(Self::new(tasks))
    }

    /// Read a CSV export with a header row, e.g.
    /// `task_id,timestamp,app_type,size_mb,priority` (`timestamp` optional)
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<TaskRecord>, csv::Error>>()?;
        let tasks = Self::from_records(records)?;
        info!("Loaded {} tasks from {:?}", tasks.len(), path);
        Ok(Self::new(tasks))
    }

    fn from_records(records: Vec<TaskRecord>) -> Result<Vec<Task>> {
        let mut origin = None;
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| record.into_task(i, &mut origin))
            .collect()
    }

    /// Write the task list as a JSON array
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.tasks)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl WorkloadSource for FixedWorkload {
    fn produce(&mut self, count: usize) -> Result<Vec<Task>> {
        if self.tasks.is_empty() {
            return Err(PlacementError::InvalidTask(
                "fixed workload has no tasks".to_string(),
            ));
        }
        let batch = (0..count)
            .map(|i| {
                let task = self.tasks[(self.cursor + i) % self.tasks.len()].clone();
                task.with_arrival_index(i)
            })
            .collect();
        self.cursor = (self.cursor + count) % self.tasks.len();
        Ok(batch)
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_seeded() {
        let mut a = WorkloadGenerator::new(42).unwrap();
        let mut b = WorkloadGenerator::new(42).unwrap();
        assert_eq!(a.produce(50).unwrap(), b.produce(50).unwrap());
    }

    #[test]
    fn test_generator_restart_repeats() {
        let mut generator = WorkloadGenerator::new(3).unwrap();
        let first = generator.produce(20).unwrap();
        let second = generator.produce(20).unwrap();
        assert_ne!(first, second);

        generator.restart();
        assert_eq!(generator.produce(20).unwrap(), first);
    }

    #[test]
    fn test_generator_respects_profiles() {
        let mut generator = WorkloadGenerator::new(11).unwrap();
        for (i, task) in generator.produce(500).unwrap().iter().enumerate() {
            assert_eq!(task.arrival_index, i);
            assert!(task.validate().is_ok());
            let (lo, hi) = match task.kind {
                TaskKind::IoT => (0.5, 3.0),
                TaskKind::ARVR => (5.0, 12.0),
                TaskKind::VANET => (2.0, 8.0),
            };
            assert!(task.size >= lo && task.size <= hi, "{task:?}");
        }
    }

    #[test]
    fn test_poisson_arrivals_increase() {
        let mut generator = WorkloadGenerator::new(5)
            .unwrap()
            .with_poisson_arrivals(2.5).unwrap();
        let tasks = generator.produce(100).unwrap();
        let times: Vec<f64> = tasks.iter().map(|t| t.arrival_time.unwrap()).collect();
        assert!(times.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_poisson_rejects_bad_lambda() {
        let generator = WorkloadGenerator::new(5).unwrap();
        assert!(generator.with_poisson_arrivals(0.0).is_err());
    }

    #[test]
    fn test_fixed_workload_wraps() {
        let tasks = vec![
            Task::new(0, TaskKind::IoT, 1.0),
            Task::new(1, TaskKind::ARVR, 6.0),
            Task::new(2, TaskKind::VANET, 3.0),
        ];
        let mut workload = FixedWorkload::new(tasks);
        let batch = workload.produce(5).unwrap();
        let ids: Vec<u64> = batch.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1]);
        assert_eq!(batch[4].arrival_index, 4);

        workload.restart();
        assert_eq!(workload.produce(1).unwrap()[0].id.0, 0);
    }

    #[test]
    fn test_empty_fixed_workload_errors() {
        let mut workload = FixedWorkload::new(vec![]);
        assert!(matches!(
            workload.produce(1),
            Err(PlacementError::InvalidTask(_))
        ));
    }
}
