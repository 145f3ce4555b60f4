//! Configuration loading for the edgeplace CLI

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use edgeplace_core::{validate_nodes, Node, NodeKind, SimulatorConfig};
use edgeplace_rl::{EncoderConfig, QLearningConfig, RuleBasedOrchestrator, RuleConfig};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "EDGEPLACE_CONFIG";

/// Configuration for an experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub experiment: ExperimentConfig,
    pub nodes: Vec<NodeConfig>,
    pub simulator: SimulatorConfig,
    pub encoder: EncoderConfig,
    pub learning: QLearningConfig,
    pub rule: RuleConfig,
    pub workload: WorkloadConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            nodes: default_nodes(),
            simulator: SimulatorConfig::default(),
            encoder: EncoderConfig::default(),
            learning: QLearningConfig::default(),
            rule: RuleConfig::default(),
            workload: WorkloadConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub seed: u64,
    pub episodes: usize,
    pub tasks_per_episode: usize,
    pub eval_tasks: usize,
    /// Replay the same task sequence in every training episode
    pub reuse_workload: bool,
    /// Arrivals after which a placed task completes; 0 keeps tasks until the
    /// episode ends
    pub completion_window: usize,
    pub output_dir: PathBuf,
    pub log_level: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            episodes: 200,
            tasks_per_episode: 300,
            eval_tasks: 300,
            reuse_workload: false,
            completion_window: 8,
            output_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: u32,
    pub kind: NodeKind,
    pub capacity: f64,
    /// Milliseconds
    pub base_latency: f64,
}

impl NodeConfig {
    pub fn to_node(&self) -> Node {
        Node::new(self.id, self.kind, self.capacity, self.base_latency)
    }
}

fn default_nodes() -> Vec<NodeConfig> {
    vec![
        NodeConfig {
            id: 0,
            kind: NodeKind::Edge,
            capacity: 20.0,
            base_latency: 5.0,
        },
        NodeConfig {
            id: 1,
            kind: NodeKind::Cloud,
            capacity: 200.0,
            base_latency: 25.0,
        },
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Tasks per second; stamps generated tasks with Poisson arrival times
    pub poisson_lambda: Option<f64>,
    /// Task list to replay instead of generating tasks (`.csv` or JSON)
    pub file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };
        Self::load_with(path.as_deref(), explicit.is_some(), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("EDGEPLACE")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(path: Option<&Path>, required: bool, env: Environment) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(required));
        }

        // Add environment variables with EDGEPLACE__ prefix
        builder = builder.add_source(env);

        let config = builder.build().context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: EDGEPLACE_CONFIG env, ./edgeplace.toml, ~/.config/edgeplace/edgeplace.toml
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("edgeplace.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("edgeplace").join("edgeplace.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    pub fn node_set(&self) -> Vec<Node> {
        self.nodes.iter().map(NodeConfig::to_node).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let experiment = &self.experiment;
        if experiment.episodes == 0 {
            bail!("experiment.episodes must be at least 1");
        }
        if experiment.tasks_per_episode == 0 || experiment.eval_tasks == 0 {
            bail!("experiment.tasks_per_episode and experiment.eval_tasks must be at least 1");
        }
        if self.encoder.load_buckets == 0 {
            bail!("encoder.load_buckets must be at least 1");
        }
        if let Some(lambda) = self.workload.poisson_lambda {
            if !lambda.is_finite() || lambda <= 0.0 {
                bail!("workload.poisson_lambda must be positive, got {lambda}");
            }
        }

        validate_nodes(&self.node_set()).context("Invalid node set")?;
        self.simulator.validate().context("Invalid simulator settings")?;
        self.learning.validate().context("Invalid learning settings")?;
        RuleBasedOrchestrator::from_config(&self.rule).context("Invalid rule settings")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> Environment {
        AppConfig::environment().source(Some(config::Map::new()))
    }

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edgeplace.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(None, false, no_env()).unwrap();
        assert_eq!(config.experiment.seed, 42);
        assert_eq!(config.experiment.episodes, 200);
        assert_eq!(config.experiment.completion_window, 8);
        assert_eq!(config.nodes, default_nodes());
        assert_eq!(config.encoder.load_buckets, 4);
        assert_eq!(config.learning.alpha, 0.5);
        assert_eq!(config.rule.threshold, 0.8);
        assert!(config.workload.file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let (_dir, path) = write_config(
            r#"
[experiment]
seed = 7
episodes = 50

[[nodes]]
id = 3
kind = "edge"
capacity = 10.0
base_latency = 4.0

[[nodes]]
id = 9
kind = "cloud"
capacity = 500.0
base_latency = 40.0

[learning]
alpha = 0.2
decay = "linear"

[simulator]
kind = "jitter"
"#,
        );

        let config = AppConfig::load_with(Some(&path), true, no_env()).unwrap();
        assert_eq!(config.experiment.seed, 7);
        assert_eq!(config.experiment.episodes, 50);
        assert_eq!(config.experiment.tasks_per_episode, 300);
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[1].id, 9);
        assert_eq!(config.learning.alpha, 0.2);
        assert_eq!(config.learning.gamma, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_file() {
        let (_dir, path) = write_config("[experiment]\nseed = 7\n");
        let mut vars = config::Map::new();
        vars.insert("EDGEPLACE__EXPERIMENT__SEED".to_string(), "99".to_string());
        vars.insert("EDGEPLACE__RULE__THRESHOLD".to_string(), "0.5".to_string());
        let env = AppConfig::environment().source(Some(vars));

        let config = AppConfig::load_with(Some(&path), true, env).unwrap();
        assert_eq!(config.experiment.seed, 99);
        assert_eq!(config.rule.threshold, 0.5);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let path = PathBuf::from("/nonexistent/edgeplace.toml");
        assert!(AppConfig::load_with(Some(&path), true, no_env()).is_err());
    }

    #[test]
    fn test_explicit_empty_node_list_is_rejected() {
        let (_dir, path) = write_config("nodes = []\n");
        let config = AppConfig::load_with(Some(&path), true, no_env()).unwrap();
        assert!(config.nodes.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::load_with(None, false, no_env()).unwrap();
        config.encoder.load_buckets = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::load_with(None, false, no_env()).unwrap();
        config.learning.gamma = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::load_with(None, false, no_env()).unwrap();
        config.learning.reward_scale = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::load_with(None, false, no_env()).unwrap();
        config.nodes[1].id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let config = AppConfig::load_with(None, false, no_env()).unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[experiment]"));
        assert!(rendered.contains("[[nodes]]"));

        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.nodes, config.nodes);
        assert_eq!(parsed.experiment.seed, 42);
    }
}
