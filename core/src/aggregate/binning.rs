//! Fixed-width rank bucketing.

use std::fmt;
use std::num::NonZeroU32;

use rankmap_types::Difficulty;
use rankmap_types::formatting::format_bucket_label;

use crate::records::ParticipationRecord;

/// Inclusive rank interval `[lower, upper]` of one bucket.
///
/// Orders by lower bound, which is total for buckets of one width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankBucket {
    pub lower: i64,
    pub upper: i64,
}

impl RankBucket {
    /// Bucket `floor((rank - 1) / width)`, so rank 1 opens the first bucket
    /// and ranks at or below zero land in negative buckets.
    pub fn for_rank(rank: i32, width: NonZeroU32) -> Self {
        let width = i64::from(width.get());
        let bin = (i64::from(rank) - 1).div_euclid(width);
        Self {
            lower: bin * width + 1,
            upper: (bin + 1) * width,
        }
    }

    pub fn contains(&self, rank: i32) -> bool {
        let rank = i64::from(rank);
        rank >= self.lower && rank <= self.upper
    }

    pub fn label(&self) -> String {
        format_bucket_label(self.lower, self.upper)
    }
}

impl fmt::Display for RankBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A record with its rank replaced by the rank's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinnedRecord {
    pub period: u32,
    pub bucket: RankBucket,
    pub category: u32,
    pub weight: f64,
    pub difficulty: Difficulty,
}

pub fn bin(records: &[ParticipationRecord], width: NonZeroU32) -> Vec<BinnedRecord> {
    records
        .iter()
        .map(|r| BinnedRecord {
            period: r.period,
            bucket: RankBucket::for_rank(r.rank, width),
            category: r.category,
            weight: r.weight,
            difficulty: r.difficulty,
        })
        .collect()
}

/// Distinct buckets in row-axis display order: highest lower bound first.
pub fn display_rows(buckets: impl IntoIterator<Item = RankBucket>) -> Vec<RankBucket> {
    let mut rows: Vec<RankBucket> = buckets.into_iter().collect();
    rows.sort_unstable_by(|a, b| b.cmp(a));
    rows.dedup();
    rows
}
