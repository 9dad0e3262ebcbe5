//! Per-category heatmap and marginal histogram construction.
//!
//! All sums are gathered in one pass over the filtered records: the
//! cross-category totals that serve as denominators and existence mask, and
//! the per-category numerators. Each category's dense [`ChartData`] is then
//! built independently against the shared axes.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use rankmap_types::{
    ChartData, ColumnHistogram, DifficultySelect, Heatmap, NormalizationMode, RowHistogram,
};
use rayon::prelude::*;

use super::binning::{BinnedRecord, RankBucket};
use crate::error::Result;
use crate::periods::{PeriodMeta, lookup};

/// Shared row and column axes for every slice of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Axes {
    /// Visible periods, ascending
    pub periods: Vec<u32>,
    pub col_labels: Vec<String>,
    /// Buckets present after filtering, highest first
    pub buckets: Vec<RankBucket>,
    pub row_labels: Vec<String>,
}

impl Axes {
    pub fn new(periods: Vec<u32>, buckets: Vec<RankBucket>, metas: &[PeriodMeta]) -> Self {
        let col_labels = periods
            .iter()
            .map(|&p| {
                let label = metas.get(p as usize).map(|m| m.label(false)).unwrap_or_default();
                if label.is_empty() { p.to_string() } else { label }
            })
            .collect();
        let row_labels = buckets.iter().map(RankBucket::label).collect();
        Self {
            periods,
            col_labels,
            buckets,
            row_labels,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SliceOptions {
    pub heatmap_mode: NormalizationMode,
    pub histogram_mode: NormalizationMode,
    pub difficulty: DifficultySelect,
}

type CellKey = (u32, RankBucket);

/// Weight sums for one category, or for all categories together.
#[derive(Debug, Default)]
struct Totals {
    cell: HashMap<CellKey, f64>,
    period: HashMap<u32, f64>,
    period_per_capita: HashMap<u32, f64>,
    bucket: HashMap<RankBucket, f64>,
    bucket_per_capita: HashMap<RankBucket, f64>,
}

impl Totals {
    fn add(&mut self, r: &BinnedRecord, per_capita: f64) {
        *self.cell.entry((r.period, r.bucket)).or_default() += r.weight;
        *self.period.entry(r.period).or_default() += r.weight;
        *self.period_per_capita.entry(r.period).or_default() += per_capita;
        *self.bucket.entry(r.bucket).or_default() += r.weight;
        *self.bucket_per_capita.entry(r.bucket).or_default() += per_capita;
    }
}

fn get<K: std::hash::Hash + Eq>(map: &HashMap<K, f64>, key: &K) -> f64 {
    map.get(key).copied().unwrap_or(0.0)
}

fn share(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 { numerator / denominator * 100.0 } else { 0.0 }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 { numerator / denominator } else { 0.0 }
}

/// Build one [`ChartData`] per category present in `records`.
///
/// `records` must already be difficulty- and range-filtered. Categories with
/// no records are simply absent from the result.
pub fn build_slices(
    records: &[BinnedRecord],
    axes: &Axes,
    metas: &[PeriodMeta],
    options: SliceOptions,
) -> Result<BTreeMap<u32, ChartData>> {
    let mut overall = Totals::default();
    let mut by_category: BTreeMap<u32, Totals> = BTreeMap::new();

    for r in records {
        let capacity = lookup(metas, r.period)?.capacity;
        let per_capita = ratio(r.weight, capacity);
        overall.add(r, per_capita);
        by_category.entry(r.category).or_default().add(r, per_capita);
    }

    // Denominators for the visible columns, resolved once
    let capacities = axes
        .periods
        .iter()
        .map(|&p| lookup(metas, p).map(|m| m.capacity))
        .collect::<Result<Vec<f64>>>()?;
    let populations = axes
        .periods
        .iter()
        .map(|&p| lookup(metas, p).map(|m| m.counts.population(options.difficulty)))
        .collect::<Result<Vec<f64>>>()?;

    let slices = by_category
        .par_iter()
        .map(|(&category, totals)| {
            let slice = SliceBuilder {
                axes,
                overall: &overall,
                totals,
                capacities: &capacities,
                populations: &populations,
                options,
            }
            .build();
            (category, slice)
        })
        .collect();

    Ok(slices)
}

struct SliceBuilder<'a> {
    axes: &'a Axes,
    overall: &'a Totals,
    totals: &'a Totals,
    capacities: &'a [f64],
    populations: &'a [f64],
    options: SliceOptions,
}

impl SliceBuilder<'_> {
    fn build(&self) -> ChartData {
        ChartData {
            heatmap: Heatmap {
                rows: self.axes.row_labels.clone(),
                cols: self.axes.col_labels.clone(),
                values: self.heatmap_values(),
            },
            column_histogram: ColumnHistogram {
                cols: self.axes.col_labels.clone(),
                values: self.column_values(),
            },
            row_histogram: RowHistogram {
                rows: self.axes.row_labels.clone(),
                values: self.row_values(),
            },
        }
    }

    /// `None` where no category has weight at the cell; otherwise this
    /// category's share of the cell, or its per-capita rate.
    fn heatmap_values(&self) -> Vec<Vec<Option<f64>>> {
        self.axes
            .buckets
            .iter()
            .map(|&bucket| {
                self.axes
                    .periods
                    .iter()
                    .zip(self.capacities)
                    .map(|(&period, &capacity)| {
                        let key = (period, bucket);
                        let total = get(&self.overall.cell, &key);
                        if total == 0.0 {
                            return None;
                        }
                        let weight = get(&self.totals.cell, &key);
                        Some(match self.options.heatmap_mode {
                            NormalizationMode::Percent => weight / total * 100.0,
                            NormalizationMode::Absolute => ratio(weight, capacity),
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn column_values(&self) -> Vec<f64> {
        self.axes
            .periods
            .iter()
            .zip(self.populations)
            .map(|(period, &population)| match self.options.histogram_mode {
                NormalizationMode::Percent => share(
                    get(&self.totals.period_per_capita, period),
                    get(&self.overall.period_per_capita, period),
                ),
                NormalizationMode::Absolute => ratio(get(&self.totals.period, period), population),
            })
            .collect()
    }

    fn row_values(&self) -> Vec<f64> {
        self.axes
            .buckets
            .iter()
            .map(|bucket| match self.options.histogram_mode {
                NormalizationMode::Percent => share(
                    get(&self.totals.bucket_per_capita, bucket),
                    get(&self.overall.bucket_per_capita, bucket),
                ),
                NormalizationMode::Absolute => get(&self.totals.bucket, bucket),
            })
            .collect()
    }
}
