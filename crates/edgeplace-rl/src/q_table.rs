//! Dense Q-value table and its persisted form

use std::path::Path;

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use edgeplace_core::{PlacementError, Result};

use crate::state::{Action, TableLayout, TABLE_LAYOUT_VERSION};

/// Q-values indexed by (state row, action column)
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    values: Array2<f64>,
}

impl QTable {
    /// All-zero table
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            values: Array2::zeros((rows, cols)),
        }
    }

    /// Table filled with values drawn uniformly from `[-scale, scale]`
    pub fn uniform<R: Rng>(rows: usize, cols: usize, scale: f64, rng: &mut R) -> Self {
        let scale = scale.abs();
        let values = Array2::from_shape_simple_fn((rows, cols), || {
            if scale > 0.0 {
                rng.gen_range(-scale..=scale)
            } else {
                0.0
            }
        });
        Self { values }
    }

    /// Rebuild from a row-major flat array
    pub fn from_flat(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(PlacementError::CorruptTable(format!(
                "table contains non-finite value {bad}"
            )));
        }
        let values = Array2::from_shape_vec((rows, cols), values).map_err(|e| {
            PlacementError::CorruptTable(format!("expected {rows}x{cols} values: {e}"))
        })?;
        Ok(Self { values })
    }

    /// Row-major copy of every value
    pub fn to_flat(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, row: usize, action: Action) -> Option<f64> {
        self.values.get((row, action)).copied()
    }

    pub fn set(&mut self, row: usize, action: Action, value: f64) -> Result<()> {
        let (rows, cols) = self.values.dim();
        let slot = self.values.get_mut((row, action)).ok_or_else(|| {
            PlacementError::InvalidState(format!(
                "({row}, {action}) outside a {rows}x{cols} table"
            ))
        })?;
        *slot = value;
        Ok(())
    }

    /// Highest-valued action of a row; ties go to the lowest action index
    pub fn best_action(&self, row: usize) -> Option<Action> {
        if row >= self.rows() || self.cols() == 0 {
            return None;
        }
        let mut best = 0;
        let mut best_value = self.values[(row, 0)];
        for (action, &value) in self.values.row(row).iter().enumerate().skip(1) {
            if value > best_value {
                best = action;
                best_value = value;
            }
        }
        Some(best)
    }

    /// `max_a Q(row, a)`
    pub fn max_value(&self, row: usize) -> Option<f64> {
        self.best_action(row).map(|a| self.values[(row, a)])
    }

    /// Number of entries that differ from zero
    pub fn visited_entries(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }
}

/// Persisted Q-table: flat values plus the layout needed to address them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableSnapshot {
    pub version: u32,
    pub layout: TableLayout,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl QTableSnapshot {
    pub fn new(layout: TableLayout, table: &QTable) -> Self {
        Self {
            version: TABLE_LAYOUT_VERSION,
            layout,
            rows: table.rows(),
            cols: table.cols(),
            values: table.to_flat(),
        }
    }

    /// Check the snapshot against the layout and action count in use and
    /// rebuild the table
    pub fn restore(&self, layout: &TableLayout, rows: usize, cols: usize) -> Result<QTable> {
        if self.version != TABLE_LAYOUT_VERSION {
            return Err(PlacementError::CorruptTable(format!(
                "layout version {} is not supported (expected {})",
                self.version, TABLE_LAYOUT_VERSION
            )));
        }
        if &self.layout != layout {
            return Err(PlacementError::CorruptTable(format!(
                "saved layout {:?} does not match current layout {:?}",
                self.layout, layout
            )));
        }
        if self.rows != rows || self.cols != cols {
            return Err(PlacementError::CorruptTable(format!(
                "saved shape {}x{} does not match expected {}x{}",
                self.rows, self.cols, rows, cols
            )));
        }
        QTable::from_flat(self.rows, self.cols, self.values.clone())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        info!("Saved {}x{} Q-table to {:?}", self.rows, self.cols, path);
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)
            .map_err(|e| PlacementError::CorruptTable(format!("{}: {e}", path.display())))?;
        info!(
            "Loaded {}x{} Q-table from {:?}",
            snapshot.rows, snapshot.cols, path
        );
        Ok(snapshot)
    }
}
