//! edgeplace core - Node/Task model, latency simulators and workload sources
//!
//! This crate provides the foundational types shared by the placement engine
//! and the command line front end.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod node;
pub mod simulator;
pub mod task;
pub mod workload;

pub use error::{PlacementError, Result};
pub use node::{validate_nodes, Node, NodeId, NodeKind};
pub use simulator::{
    JitterSimulator, LatencySimulator, SimpleSimulator, SimulatorConfig, SimulatorKind,
};
pub use task::{Priority, Task, TaskId, TaskKind};
pub use workload::{FixedWorkload, WorkloadGenerator, WorkloadSource};
