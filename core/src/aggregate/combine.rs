//! Summing category slices into one view.

use std::collections::{BTreeMap, BTreeSet};

use rankmap_types::ChartData;

/// Sum slices cell-wise and series-wise. `None` for an empty input.
///
/// The first slice fixes which heatmap cells are defined: a later slice only
/// adds where both it and the running sum have a value. Slices from one
/// aggregation pass share axes and existence mask, so the order of the
/// input does not change the result.
pub fn combine<'a, I>(slices: I) -> Option<ChartData>
where
    I: IntoIterator<Item = &'a ChartData>,
{
    let mut slices = slices.into_iter();
    let mut combined = slices.next()?.clone();
    for slice in slices {
        add_into(&mut combined, slice);
    }
    Some(combined)
}

/// Combine the selected categories. Categories without a slice are skipped.
pub fn combine_selected(
    slices: &BTreeMap<u32, ChartData>,
    selection: &BTreeSet<u32>,
) -> Option<ChartData> {
    combine(selection.iter().filter_map(|z| slices.get(z)))
}

fn add_into(acc: &mut ChartData, slice: &ChartData) {
    for (acc_row, row) in acc.heatmap.values.iter_mut().zip(&slice.heatmap.values) {
        for (acc_cell, cell) in acc_row.iter_mut().zip(row) {
            if let (Some(sum), Some(value)) = (acc_cell.as_mut(), cell) {
                *sum += value;
            }
        }
    }
    for (sum, value) in acc
        .column_histogram
        .values
        .iter_mut()
        .zip(&slice.column_histogram.values)
    {
        *sum += value;
    }
    for (sum, value) in acc
        .row_histogram
        .values
        .iter_mut()
        .zip(&slice.row_histogram.values)
    {
        *sum += value;
    }
}
