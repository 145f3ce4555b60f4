//! Aggregated training and evaluation statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use edgeplace_core::{NodeKind, TaskKind};

use crate::experience::PlacementRecord;

/// Summary of one training episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub episode: usize,
    pub avg_reward: f64,
    pub avg_latency_ms: f64,
    /// Exploration rate in effect during the episode
    pub epsilon: Option<f64>,
    pub placed: usize,
    pub skipped: usize,
    /// Fraction of placements that went to edge nodes
    pub edge_share: f64,
}

/// Latency distribution of a set of placements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator), 0 for a single sample
    pub std_dev: f64,
    /// Standard error of the mean
    pub sem: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
}

impl LatencySummary {
    pub fn from_latencies(latencies: &[f64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        let count = latencies.len();
        let n = count as f64;
        let mean = latencies.iter().sum::<f64>() / n;
        let std_dev = if count > 1 {
            let sum_sq = latencies.iter().map(|l| (l - mean).powi(2)).sum::<f64>();
            (sum_sq / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        let mut sorted = latencies.to_vec();
        sorted.sort_by(f64::total_cmp);
        // Nearest rank
        let rank = ((0.95 * n).ceil() as usize).clamp(1, count);

        Self {
            count,
            mean,
            std_dev,
            sem: std_dev / n.sqrt(),
            min: sorted[0],
            max: sorted[count - 1],
            p95: sorted[rank - 1],
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub policy: String,
    pub episodes: Vec<EpisodeStats>,
    /// Set when a stop request ended training before the configured count
    pub stopped_early: bool,
}

impl TrainingSummary {
    /// Mean of the per-episode average latencies over the last `n` episodes
    pub fn recent_avg_latency(&self, n: usize) -> Option<f64> {
        let tail: Vec<f64> = self
            .episodes
            .iter()
            .rev()
            .take(n)
            .map(|e| e.avg_latency_ms)
            .collect();
        if tail.is_empty() {
            None
        } else {
            Some(tail.iter().sum::<f64>() / tail.len() as f64)
        }
    }

    pub fn to_metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("train.episodes".to_string(), self.episodes.len() as f64);
        if let Some(last) = self.episodes.last() {
            metrics.insert("train.final_avg_reward".to_string(), last.avg_reward);
            metrics.insert("train.final_avg_latency_ms".to_string(), last.avg_latency_ms);
            if let Some(eps) = last.epsilon {
                metrics.insert("train.final_epsilon".to_string(), eps);
            }
        }
        if let Some(recent) = self.recent_avg_latency(10) {
            metrics.insert("train.recent_avg_latency_ms".to_string(), recent);
        }
        metrics
    }
}

/// Result of evaluating one policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub policy: String,
    pub records: Vec<PlacementRecord>,
    pub summary: LatencySummary,
    pub total_reward: f64,
    pub skipped: usize,
}

impl EvaluationReport {
    pub fn edge_share(&self) -> f64 {
        edge_share(&self.records)
    }

    /// Latency summary per task kind, for kinds present in the records
    pub fn by_task_kind(&self) -> BTreeMap<TaskKind, LatencySummary> {
        let mut grouped: BTreeMap<TaskKind, Vec<f64>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.task_kind)
                .or_default()
                .push(record.latency_ms);
        }
        grouped
            .into_iter()
            .map(|(kind, latencies)| (kind, LatencySummary::from_latencies(&latencies)))
            .collect()
    }

    pub fn to_metrics(&self) -> BTreeMap<String, f64> {
        let p = &self.policy;
        let s = &self.summary;
        let mut metrics = BTreeMap::from([
            (format!("{p}.count"), s.count as f64),
            (format!("{p}.mean_latency_ms"), s.mean),
            (format!("{p}.std_latency_ms"), s.std_dev),
            (format!("{p}.sem_latency_ms"), s.sem),
            (format!("{p}.min_latency_ms"), s.min),
            (format!("{p}.max_latency_ms"), s.max),
            (format!("{p}.p95_latency_ms"), s.p95),
            (format!("{p}.total_reward"), self.total_reward),
            (format!("{p}.edge_share"), self.edge_share()),
            (format!("{p}.skipped"), self.skipped as f64),
        ]);
        for (kind, summary) in self.by_task_kind() {
            metrics.insert(format!("{p}.{kind}.count"), summary.count as f64);
            metrics.insert(format!("{p}.{kind}.mean_latency_ms"), summary.mean);
        }
        metrics
    }
}

/// Several policies evaluated on the same tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub reports: Vec<EvaluationReport>,
}

impl ComparisonReport {
    /// Policy with the lowest mean latency
    pub fn best(&self) -> Option<&EvaluationReport> {
        self.reports
            .iter()
            .filter(|r| r.summary.count > 0)
            .min_by(|a, b| a.summary.mean.total_cmp(&b.summary.mean))
    }

    pub fn get(&self, policy: &str) -> Option<&EvaluationReport> {
        self.reports.iter().find(|r| r.policy == policy)
    }

    pub fn to_metrics(&self) -> BTreeMap<String, f64> {
        self.reports.iter().flat_map(EvaluationReport::to_metrics).collect()
    }
}

pub(crate) fn edge_share(records: &[PlacementRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let edge = records
        .iter()
        .filter(|r| r.node_kind == NodeKind::Edge)
        .count();
    edge as f64 / records.len() as f64
}
