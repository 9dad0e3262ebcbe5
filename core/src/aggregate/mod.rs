//! Aggregation pipeline from parsed records to renderable slices.
//!
//! ```text
//! records ──bin──▶ binned ──filter──▶ filtered ──▶ per-category ChartData
//!                    │                    ▲
//!                    └──visible_periods───┘ (columns)
//! ```
//!
//! Every stage is synchronous and a pure function of its inputs, so a
//! recompute with identical controls yields an identical result.

pub mod binning;
pub mod combine;
pub mod filter;
pub mod slices;


use std::collections::{BTreeMap, BTreeSet};

use rankmap_types::{ChartControls, ChartData, PeriodRange};
use tracing::debug;

pub use binning::{BinnedRecord, RankBucket, bin, display_rows};
pub use combine::{combine, combine_selected};
pub use filter::{filter_records, visible_periods};
pub use slices::{Axes, SliceOptions, build_slices};

use crate::error::Result;
use crate::periods::PeriodMeta;
use crate::records::ParticipationRecord;

/// Output of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub slices: BTreeMap<u32, ChartData>,
    pub available_categories: BTreeSet<u32>,
    /// Period span of the whole dataset, before any filtering
    pub full_period_range: PeriodRange,
}

/// Run the full pipeline for one set of controls.
///
/// `empty_range` is reported as the full period range when the dataset has
/// no records.
pub fn aggregate(
    records: &[ParticipationRecord],
    metas: &[PeriodMeta],
    controls: &ChartControls,
    empty_range: PeriodRange,
) -> Result<AggregateResult> {
    let binned = bin(records, controls.bucket_width);

    let full_period_range = match (
        binned.iter().map(|r| r.period).min(),
        binned.iter().map(|r| r.period).max(),
    ) {
        (Some(min), Some(max)) => PeriodRange::new(min, max),
        _ => empty_range,
    };

    let filtered = filter_records(&binned, controls.difficulty, controls.period_range);
    let periods = visible_periods(
        &binned,
        controls.difficulty,
        controls.period_range,
        controls.hide_threshold,
        metas,
    )?;
    let buckets = display_rows(filtered.iter().map(|r| r.bucket));
    let axes = Axes::new(periods, buckets, metas);

    let slices = build_slices(
        &filtered,
        &axes,
        metas,
        SliceOptions {
            heatmap_mode: controls.heatmap_mode,
            histogram_mode: controls.histogram_mode,
            difficulty: controls.difficulty,
        },
    )?;

    debug!(
        records = records.len(),
        filtered = filtered.len(),
        columns = axes.periods.len(),
        rows = axes.buckets.len(),
        categories = slices.len(),
        "Aggregated chart data"
    );

    Ok(AggregateResult {
        available_categories: slices.keys().copied().collect(),
        slices,
        full_period_range,
    })
}
