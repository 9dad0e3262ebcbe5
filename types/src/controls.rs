//! User-facing chart controls.
//!
//! `ChartControls` is the complete parameter set for one aggregation pass.
//! It is replaced wholesale on every change, never patched in place, so a
//! committed result can always be traced back to the exact value that
//! produced it.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Difficulty tier of a participation record, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Lunatic,
    Torment,
    Insane,
    #[serde(alias = "Extrime")]
    Extreme,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Lunatic,
        Difficulty::Torment,
        Difficulty::Insane,
        Difficulty::Extreme,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Lunatic => "Lunatic",
            Difficulty::Torment => "Torment",
            Difficulty::Insane => "Insane",
            Difficulty::Extreme => "Extreme",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = ParseControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lunatic" => Ok(Difficulty::Lunatic),
            "torment" => Ok(Difficulty::Torment),
            "insane" => Ok(Difficulty::Insane),
            "extreme" | "extrime" => Ok(Difficulty::Extreme),
            _ => Err(ParseControlError::new("difficulty", s)),
        }
    }
}

/// Difficulty filter selection. `All` disables filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DifficultySelect {
    #[default]
    All,
    Only(Difficulty),
}

impl DifficultySelect {
    pub fn matches(self, difficulty: Difficulty) -> bool {
        match self {
            DifficultySelect::All => true,
            DifficultySelect::Only(d) => d == difficulty,
        }
    }
}

impl fmt::Display for DifficultySelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultySelect::All => f.write_str("All"),
            DifficultySelect::Only(d) => f.write_str(d.name()),
        }
    }
}

impl FromStr for DifficultySelect {
    type Err = ParseControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(DifficultySelect::All);
        }
        s.parse().map(DifficultySelect::Only)
    }
}

impl TryFrom<String> for DifficultySelect {
    type Error = ParseControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DifficultySelect> for String {
    fn from(value: DifficultySelect) -> Self {
        value.to_string()
    }
}

/// How heatmap cells or histogram bars are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Share of the cross-category total, 0..=100
    Percent,
    /// Per-capita rate against the period's population
    #[default]
    Absolute,
}

impl NormalizationMode {
    /// Fixed color scale for heatmaps in this mode, if any.
    pub fn fixed_scale(self) -> Option<(f64, f64)> {
        match self {
            NormalizationMode::Percent => Some((0.0, 100.0)),
            NormalizationMode::Absolute => None,
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMode::Percent => f.write_str("percent"),
            NormalizationMode::Absolute => f.write_str("absolute"),
        }
    }
}

impl FromStr for NormalizationMode {
    type Err = ParseControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "percent" | "pct" | "%" => Ok(NormalizationMode::Percent),
            "absolute" | "abs" => Ok(NormalizationMode::Absolute),
            _ => Err(ParseControlError::new("normalization mode", s)),
        }
    }
}

/// Inclusive period index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodRange {
    pub min: u32,
    pub max: u32,
}

impl PeriodRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, period: u32) -> bool {
        period >= self.min && period <= self.max
    }
}

impl Default for PeriodRange {
    fn default() -> Self {
        Self { min: 0, max: 150 }
    }
}

impl From<(u32, u32)> for PeriodRange {
    fn from((min, max): (u32, u32)) -> Self {
        Self { min, max }
    }
}

pub const DEFAULT_BUCKET_WIDTH: NonZeroU32 = NonZeroU32::new(500).unwrap();
pub const DEFAULT_HIDE_THRESHOLD: f64 = 1000.0;

/// Every parameter the aggregation pipeline and combiner read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartControls {
    /// Dataset entity (e.g. a character id); `None` shows nothing
    pub entity: Option<u32>,
    pub bucket_width: NonZeroU32,
    pub difficulty: DifficultySelect,
    pub period_range: PeriodRange,
    /// Minimum total weight per unit of capacity for a period column to show
    pub hide_threshold: f64,
    pub heatmap_mode: NormalizationMode,
    pub histogram_mode: NormalizationMode,
    pub selected_categories: BTreeSet<u32>,
}

impl Default for ChartControls {
    fn default() -> Self {
        Self {
            entity: None,
            bucket_width: DEFAULT_BUCKET_WIDTH,
            difficulty: DifficultySelect::All,
            period_range: PeriodRange::default(),
            hide_threshold: DEFAULT_HIDE_THRESHOLD,
            heatmap_mode: NormalizationMode::Absolute,
            histogram_mode: NormalizationMode::Absolute,
            selected_categories: BTreeSet::new(),
        }
    }
}

impl ChartControls {
    /// True if switching from `self` to `other` needs a new aggregation pass.
    ///
    /// Category selection is applied after aggregation, so it never does.
    pub fn needs_recompute(&self, other: &ChartControls) -> bool {
        self.entity != other.entity
            || self.bucket_width != other.bucket_width
            || self.difficulty != other.difficulty
            || self.period_range != other.period_range
            || self.hide_threshold.to_bits() != other.hide_threshold.to_bits()
            || self.heatmap_mode != other.heatmap_mode
            || self.histogram_mode != other.histogram_mode
    }
}

/// Unrecognized value for a named control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseControlError {
    control: &'static str,
    value: String,
}

impl ParseControlError {
    fn new(control: &'static str, value: &str) -> Self {
        Self {
            control,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.control, self.value)
    }
}

impl std::error::Error for ParseControlError {}
