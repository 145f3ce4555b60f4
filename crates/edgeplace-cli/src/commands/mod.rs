//! CLI command modules

pub mod compare;
pub mod config;
pub mod evaluate;
pub mod train;
pub mod workload;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use edgeplace_rl::EvaluationReport;

/// Write `value` as pretty JSON, creating parent directories
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub(crate) fn print_reports(reports: &[EvaluationReport]) {
    println!(
        "{:<12} {:>7} {:>10} {:>10} {:>10} {:>10} {:>10} {:>6}",
        "POLICY", "TASKS", "MEAN_MS", "STD_MS", "MIN_MS", "P95_MS", "MAX_MS", "EDGE"
    );
    println!("{}", "-".repeat(82));
    for report in reports {
        let s = &report.summary;
        println!(
            "{:<12} {:>7} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>5.0}%",
            report.policy,
            s.count,
            s.mean,
            s.std_dev,
            s.min,
            s.p95,
            s.max,
            report.edge_share() * 100.0
        );
    }
}
