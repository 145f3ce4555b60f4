//! edgeplace RL - learned and baseline placement policies
//!
//! This crate provides the state encoder, the tabular Q-learning policy, the
//! random and rule-based baselines, and the engine that trains and evaluates
//! them against a simulated edge/cloud environment.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod algorithm;
pub mod baseline;
pub mod engine;
pub mod experience;
pub mod q_table;
pub mod report;
pub mod state;
pub mod stats;

pub use algorithm::{
    DecayKind, EpsilonSchedule, Mode, Orchestrator, QLearningConfig, QLearningOrchestrator,
    RewardFn, TableInit,
};
pub use baseline::{RandomOrchestrator, RuleBasedOrchestrator, RuleConfig};
pub use engine::{EngineConfig, InvalidTaskPolicy, PlacementEngine};
pub use experience::{Experience, PlacementRecord};
pub use q_table::{QTable, QTableSnapshot};
pub use report::{NoopReporter, Reporter, TracingReporter};
pub use state::{
    Action, EncoderConfig, Reward, State, StateEncoder, TableLayout, TABLE_LAYOUT_VERSION,
};
pub use stats::{
    ComparisonReport, EpisodeStats, EvaluationReport, LatencySummary, TrainingSummary,
};
