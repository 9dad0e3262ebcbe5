//! Per-period metadata.
//!
//! Loaded from a JSON array indexed by period. Each entry names the event
//! and carries the two normalization denominators the aggregator needs: the
//! period's capacity (`MaxLv`) and its participant counts per difficulty
//! (`Cnt`).

use rankmap_types::{Difficulty, DifficultySelect};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Participant counts for one period, by difficulty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationCounts {
    #[serde(rename = "All")]
    pub all: f64,
    #[serde(rename = "Lunatic", default)]
    pub lunatic: Option<f64>,
    #[serde(rename = "Torment", default)]
    pub torment: Option<f64>,
    #[serde(rename = "Insane", default)]
    pub insane: Option<f64>,
    #[serde(rename = "Extreme", alias = "Extrime", default)]
    pub extreme: Option<f64>,
}

impl PopulationCounts {
    pub fn get(&self, difficulty: Difficulty) -> Option<f64> {
        match difficulty {
            Difficulty::Lunatic => self.lunatic,
            Difficulty::Torment => self.torment,
            Difficulty::Insane => self.insane,
            Difficulty::Extreme => self.extreme,
        }
    }

    /// Population for the active difficulty filter.
    ///
    /// A missing or zero per-difficulty count falls back to the `All` count.
    /// This conflates "no participants" with "not tracked"; kept as-is until
    /// the data source distinguishes the two.
    pub fn population(&self, select: DifficultySelect) -> f64 {
        match select {
            DifficultySelect::All => self.all,
            DifficultySelect::Only(d) => self
                .get(d)
                .filter(|count| *count != 0.0 && !count.is_nan())
                .unwrap_or(self.all),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeriodMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub boss: String,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Normalization denominator (population size)
    #[serde(rename = "MaxLv", alias = "capacity")]
    pub capacity: f64,
    #[serde(rename = "Cnt", alias = "counts")]
    pub counts: PopulationCounts,
}

impl PeriodMeta {
    /// Column label: `Id-Alias-Type`, falling back to the boss name when no
    /// alias is set. Empty parts are skipped.
    pub fn label(&self, show_date: bool) -> String {
        let name = self
            .alias
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.boss);

        let mut label = [Some(self.id.as_str()), Some(name), self.kind.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        if show_date && let Some(date) = self.date.as_deref().filter(|d| !d.is_empty()) {
            label.push_str(&format!(" ({date})"));
        }
        label
    }
}

/// Decode the period metadata JSON array.
pub fn parse_period_meta(key: &str, text: &str) -> Result<Vec<PeriodMeta>> {
    serde_json::from_str(text).map_err(|e| Error::parse(key, e))
}

/// Metadata for `period`, or a compute error if the table does not cover it.
pub fn lookup(metas: &[PeriodMeta], period: u32) -> Result<&PeriodMeta> {
    metas.get(period as usize).ok_or_else(|| {
        Error::Compute(format!(
            "no metadata for period {period} ({} periods known)",
            metas.len()
        ))
    })
}
