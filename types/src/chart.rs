//! Renderable chart view model.
//!
//! A [`ChartData`] is the fully aggregated heatmap plus both marginal
//! histograms for one category, or the sum of several categories. Axes are
//! plain display labels; the heatmap is indexed `values[row][col]`.

use serde::{Deserialize, Serialize};

/// Dense period × rank-bucket matrix.
///
/// A `None` cell means no data exists for that (period, bucket) pair and must
/// render as a gap. It is not the same thing as a measured zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    /// Rank bucket labels, worst rank range first
    pub rows: Vec<String>,
    /// Period column labels, ascending period index
    pub cols: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl Heatmap {
    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols.is_empty()
    }
}

/// Marginal histogram along the period axis (drawn above the heatmap).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnHistogram {
    pub cols: Vec<String>,
    pub values: Vec<f64>,
}

/// Marginal histogram along the rank-bucket axis (drawn right of the heatmap).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowHistogram {
    pub rows: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub heatmap: Heatmap,
    pub column_histogram: ColumnHistogram,
    pub row_histogram: RowHistogram,
}

impl ChartData {
    /// Number of non-null heatmap cells.
    pub fn defined_cells(&self) -> usize {
        self.heatmap
            .values
            .iter()
            .map(|row| row.iter().filter(|v| v.is_some()).count())
            .sum()
    }
}
