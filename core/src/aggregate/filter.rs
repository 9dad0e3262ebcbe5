//! Row filters and sparse-column suppression.

use hashbrown::HashMap;
use rankmap_types::{DifficultySelect, PeriodRange};

use super::binning::BinnedRecord;
use crate::error::Result;
use crate::periods::{PeriodMeta, lookup};

/// Keep records matching the difficulty selection, then those inside the
/// inclusive period range.
pub fn filter_records(
    records: &[BinnedRecord],
    difficulty: DifficultySelect,
    range: PeriodRange,
) -> Vec<BinnedRecord> {
    records
        .iter()
        .filter(|r| difficulty.matches(r.difficulty))
        .filter(|r| range.contains(r.period))
        .copied()
        .collect()
}

/// Period columns that are dense enough to show.
///
/// Every period in `[0, max_period]` (max over the unfiltered dataset) is
/// checked against its difficulty-filtered total weight, ignoring the period
/// range: a period is kept if that total reaches `threshold * capacity`
/// (capacity 0 counts as 1). Survivors are then clipped to `range`.
pub fn visible_periods(
    records: &[BinnedRecord],
    difficulty: DifficultySelect,
    range: PeriodRange,
    threshold: f64,
    metas: &[PeriodMeta],
) -> Result<Vec<u32>> {
    let Some(max_period) = records.iter().map(|r| r.period).max() else {
        return Ok(Vec::new());
    };

    let mut totals: HashMap<u32, f64> = HashMap::new();
    for r in records.iter().filter(|r| difficulty.matches(r.difficulty)) {
        *totals.entry(r.period).or_default() += r.weight;
    }

    let mut visible = Vec::new();
    for period in 0..=max_period {
        let meta = lookup(metas, period)?;
        let capacity = if meta.capacity > 0.0 { meta.capacity } else { 1.0 };
        let total = totals.get(&period).copied().unwrap_or(0.0);
        if total >= threshold * capacity && range.contains(period) {
            visible.push(period);
        }
    }
    Ok(visible)
}
