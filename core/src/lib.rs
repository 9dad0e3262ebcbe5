pub mod aggregate;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod periods;
pub mod records;

// Re-exports for convenience
pub use aggregate::{AggregateResult, aggregate, combine, combine_selected};
pub use config::{ConfigError, RankmapConfig, SourceConfig, load_config, save_config};
pub use controller::{ChartController, ControllerState};
pub use error::{Error, Result};
pub use fetch::{DirectorySource, HttpSource, ResourceCache, ResourceSource, source_for_base};
pub use periods::{PeriodMeta, PopulationCounts};
pub use records::{DIFFICULTY_TABLE, ParticipationRecord, parse_rows};
