//! Centralized number and label formatting.
//!
//! Chart labels and cell readouts go through this module so the CLI and any
//! renderer agree on how buckets, percentages and per-capita rates look, and
//! so European-style number formatting (swapping `.` and `,`) is applied in
//! one place.

use crate::controls::NormalizationMode;

/// Swap `.` and `,` in a formatted number.
fn europeanize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '.' => ',',
            ',' => '.',
            _ => c,
        })
        .collect()
}

#[inline]
fn maybe_eu(s: String, european: bool) -> String {
    if european { europeanize(&s) } else { s }
}

/// Format an inclusive rank interval as a bucket label.
///
/// # Examples
/// ```
/// use rankmap_types::formatting::format_bucket_label;
/// assert_eq!(format_bucket_label(1, 500), "1-500");
/// assert_eq!(format_bucket_label(-9, 0), "-9-0");
/// ```
pub fn format_bucket_label(lower: i64, upper: i64) -> String {
    format!("{lower}-{upper}")
}

/// Format a large f64 number with K/M suffix for compact display.
///
/// # Examples
/// ```
/// use rankmap_types::formatting::format_compact_f64;
/// assert_eq!(format_compact_f64(1_500.0, false), "1.50K");
/// assert_eq!(format_compact_f64(2_250_000.0, true), "2,25M");
/// assert_eq!(format_compact_f64(42.0, false), "42");
/// ```
pub fn format_compact_f64(n: f64, european: bool) -> String {
    let n_abs = n.abs();
    let s = if n_abs >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n_abs >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{:.0}", n)
    };
    maybe_eu(s, european)
}

/// Format a percentage value with 1 decimal place.
///
/// # Examples
/// ```
/// use rankmap_types::formatting::format_pct;
/// assert_eq!(format_pct(66.666, false), "66.7%");
/// assert_eq!(format_pct(66.666, true), "66,7%");
/// ```
pub fn format_pct(n: f64, european: bool) -> String {
    maybe_eu(format!("{:.1}%", n), european)
}

/// Format a per-capita rate. Small rates keep four significant decimals.
///
/// # Examples
/// ```
/// use rankmap_types::formatting::format_rate;
/// assert_eq!(format_rate(0.0, false), "0");
/// assert_eq!(format_rate(0.012345, false), "0.0123");
/// assert_eq!(format_rate(1.5, true), "1,50");
/// ```
pub fn format_rate(n: f64, european: bool) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    let s = if n.abs() < 1.0 {
        format!("{:.4}", n)
    } else {
        format!("{:.2}", n)
    };
    maybe_eu(s, european)
}

/// Format a heatmap cell for a text readout. Gaps render as an empty string.
///
/// # Examples
/// ```
/// use rankmap_types::NormalizationMode;
/// use rankmap_types::formatting::format_cell;
/// assert_eq!(format_cell(None, NormalizationMode::Percent, false), "");
/// assert_eq!(format_cell(Some(50.0), NormalizationMode::Percent, false), "50.0%");
/// assert_eq!(format_cell(Some(0.5), NormalizationMode::Absolute, false), "0.5000");
/// ```
pub fn format_cell(value: Option<f64>, mode: NormalizationMode, european: bool) -> String {
    match (value, mode) {
        (None, _) => String::new(),
        (Some(v), NormalizationMode::Percent) => format_pct(v, european),
        (Some(v), NormalizationMode::Absolute) => format_rate(v, european),
    }
}
