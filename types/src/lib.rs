//! Shared types for RANKMAP.
//!
//! Everything a renderer needs to draw the heatmap view lives here, so the
//! UI layer can depend on this crate without pulling in the loading and
//! aggregation machinery from `rankmap-core`.

pub mod chart;
pub mod controls;
pub mod formatting;

pub use chart::{ChartData, ColumnHistogram, Heatmap, RowHistogram};
pub use controls::{
    ChartControls, Difficulty, DifficultySelect, NormalizationMode, ParseControlError, PeriodRange,
};
