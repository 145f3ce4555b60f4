//! Reporting hooks for training and evaluation results
//!
//! The engine calls a [`Reporter`] at the end of every episode and every
//! evaluation. Reporting is optional: every method defaults to a no-op, and an
//! engine without a reporter behaves identically.

use tracing::info;

use crate::stats::{EpisodeStats, LatencySummary};

/// Receiver for aggregate results
#[allow(unused_variables)]
pub trait Reporter: Send + Sync {
    fn episode_completed(&self, stats: &EpisodeStats) {}

    fn evaluation_completed(&self, policy: &str, summary: &LatencySummary) {}
}

/// A reporter that does nothing
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Emits results as structured `tracing` events
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn episode_completed(&self, stats: &EpisodeStats) {
        info!(
            target: "edgeplace::report",
            episode = stats.episode,
            avg_reward = stats.avg_reward,
            avg_latency_ms = stats.avg_latency_ms,
            epsilon = stats.epsilon.unwrap_or(0.0),
            edge_share = stats.edge_share,
            "episode completed"
        );
    }

    fn evaluation_completed(&self, policy: &str, summary: &LatencySummary) {
        info!(
            target: "edgeplace::report",
            policy,
            count = summary.count,
            mean_latency_ms = summary.mean,
            std_latency_ms = summary.std_dev,
            p95_latency_ms = summary.p95,
            "evaluation completed"
        );
    }
}
