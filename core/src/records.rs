//! Participation records and the TSV row parser.
//!
//! A dataset is a tab-separated table with five positional fields per row:
//!
//! ```text
//! period  rank  category  weight  difficulty_index
//! 12      1534  3         27      0
//! ```
//!
//! The difficulty index resolves through [`DIFFICULTY_TABLE`], which is shared
//! with anything else that needs the tier order.

use std::cmp::Ordering;

use memchr::memchr_iter;
use rankmap_types::Difficulty;

use crate::error::{Error, Result};

/// Difficulty tiers in raw-index order.
pub const DIFFICULTY_TABLE: [Difficulty; 4] = [
    Difficulty::Lunatic,
    Difficulty::Torment,
    Difficulty::Insane,
    Difficulty::Extreme,
];

pub fn difficulty_from_index(index: usize) -> Option<Difficulty> {
    DIFFICULTY_TABLE.get(index).copied()
}

/// One weighted (period, rank, category) observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticipationRecord {
    pub period: u32,
    /// Negative ranks are the assist/helper sub-population
    pub rank: i32,
    pub category: u32,
    pub weight: f64,
    pub difficulty: Difficulty,
}

/// Display order for ranks: by magnitude, with `-n` right after `n`.
pub fn rank_display_order(a: i32, b: i32) -> Ordering {
    a.unsigned_abs()
        .cmp(&b.unsigned_abs())
        .then_with(|| a.is_negative().cmp(&b.is_negative()))
}

/// Parse a decompressed TSV payload into records.
///
/// Blank lines are skipped. Any other malformed line, including an unknown
/// difficulty index, fails the whole payload. Records come back ordered by
/// period, then by [`rank_display_order`].
pub fn parse_rows(key: &str, text: &str) -> Result<Vec<ParticipationRecord>> {
    let bytes = text.as_bytes();
    let mut records = Vec::with_capacity(bytes.len() / 16);
    let mut start = 0;

    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for (idx, end) in ends.enumerate() {
        let line = text[start..end].trim_end_matches('\r');
        start = end + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_row(line).map_err(|reason| {
            Error::parse(key, format!("line {}: {}", idx + 1, reason))
        })?;
        records.push(record);
    }

    records.sort_by(|a, b| {
        a.period
            .cmp(&b.period)
            .then_with(|| rank_display_order(a.rank, b.rank))
    });
    Ok(records)
}

fn parse_row(line: &str) -> Result<ParticipationRecord, String> {
    let mut fields = line.split('\t');
    let mut next = |name: &str| {
        fields
            .next()
            .map(str::trim)
            .ok_or_else(|| format!("missing {name} field"))
    };

    let period = next("period")?;
    let rank = next("rank")?;
    let category = next("category")?;
    let weight = next("weight")?;
    let difficulty = next("difficulty")?;
    if fields.next().is_some() {
        return Err("expected 5 fields".to_string());
    }

    let difficulty_index: usize = difficulty
        .parse()
        .map_err(|_| format!("invalid difficulty index {difficulty:?}"))?;

    Ok(ParticipationRecord {
        period: period
            .parse()
            .map_err(|_| format!("invalid period {period:?}"))?,
        rank: rank.parse().map_err(|_| format!("invalid rank {rank:?}"))?,
        category: category
            .parse()
            .map_err(|_| format!("invalid category {category:?}"))?,
        weight: weight
            .parse()
            .map_err(|_| format!("invalid weight {weight:?}"))?,
        difficulty: difficulty_from_index(difficulty_index).ok_or_else(|| {
            format!(
                "difficulty index {difficulty_index} out of range (0..{})",
                DIFFICULTY_TABLE.len()
            )
        })?,
    })
}
