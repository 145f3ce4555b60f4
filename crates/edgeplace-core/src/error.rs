//! Error types for edgeplace

use thiserror::Error;

/// Main error type for placement, simulation and table persistence
#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("Invalid node set: {0}")]
    InvalidNodeSet(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Corrupt Q-table: {0}")]
    CorruptTable(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid reward: {0}")]
    InvalidReward(f64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for edgeplace operations
pub type Result<T> = std::result::Result<T, PlacementError>;
