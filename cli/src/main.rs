//! Command-line front end.
//!
//! Loads one dataset through the chart controller and prints the combined
//! view of the selected categories. With `--repl` the session stays open and
//! controls can be changed line by line; unchanged datasets are served from
//! the in-memory cache.

mod commands;

use std::io::Write;
use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rankmap_core::{ChartController, RankmapConfig, load_config};
use rankmap_types::{DifficultySelect, NormalizationMode, PeriodRange};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Rank heatmaps with marginal histograms")]
struct Args {
    /// Dataset directory or http(s) base URL
    #[arg(long)]
    base: Option<String>,
    #[arg(long)]
    entity: Option<u32>,
    /// Rank bucket width
    #[arg(long)]
    width: Option<NonZeroU32>,
    /// All, Lunatic, Torment, Insane or Extreme
    #[arg(long)]
    difficulty: Option<DifficultySelect>,
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    range: Option<Vec<u32>>,
    /// Hide periods with less total weight than this per unit of capacity
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long)]
    heatmap_mode: Option<NormalizationMode>,
    #[arg(long)]
    histogram_mode: Option<NormalizationMode>,
    /// Categories to combine (repeatable); all available when omitted
    #[arg(long = "category")]
    categories: Vec<u32>,
    /// Print the combined view as JSON
    #[arg(long)]
    json: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Keep the session open and read commands from stdin
    #[arg(long)]
    repl: bool,
}

impl Args {
    fn apply(&self, config: &mut RankmapConfig) {
        if let Some(base) = &self.base {
            config.source.base = base.clone();
        }
        let controls = &mut config.controls;
        if self.entity.is_some() {
            controls.entity = self.entity;
        }
        if let Some(width) = self.width {
            controls.bucket_width = width;
        }
        if let Some(difficulty) = self.difficulty {
            controls.difficulty = difficulty;
        }
        if let Some([min, max]) = self.range.as_deref() {
            controls.period_range = PeriodRange::new(*min, *max);
        }
        if let Some(threshold) = self.threshold {
            controls.hide_threshold = threshold;
        }
        if let Some(mode) = self.heatmap_mode {
            controls.heatmap_mode = mode;
        }
        if let Some(mode) = self.histogram_mode {
            controls.histogram_mode = mode;
        }
        if !self.categories.is_empty() {
            controls.selected_categories = self.categories.iter().copied().collect();
        }
    }
}

/// Log to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_logging();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref()).map_err(|e| e.to_string())?;
    args.apply(&mut config);

    let controller = ChartController::new(&config);
    controller.refresh().await;
    if config.controls.selected_categories.is_empty() {
        commands::select_all(&controller).await;
    }

    if !args.repl {
        commands::show(&controller, args.json).await?;
        return match controller.state().error {
            Some(error) => Err(error),
            None => Ok(()),
        };
    }

    commands::status(&controller).await;
    let session = Session {
        controller,
        config_path: args.config,
        base_config: config,
    };

    loop {
        let Some(line) = readline()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &session).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

/// Prompt and read one line. `None` at end of input.
fn readline() -> Result<Option<String>, String> {
    write!(std::io::stdout(), "> ").map_err(|e| e.to_string())?;
    std::io::stdout().flush().map_err(|e| e.to_string())?;
    let mut buffer = String::new();
    let read = std::io::stdin()
        .read_line(&mut buffer)
        .map_err(|e| e.to_string())?;
    Ok((read > 0).then_some(buffer))
}

struct Session {
    controller: ChartController,
    config_path: Option<PathBuf>,
    /// Loaded configuration; `save` writes the current controls into it
    base_config: RankmapConfig,
}

#[derive(Parser)]
#[command(no_binary_name = true, about = "rankmap session")]
struct Repl {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch dataset; no id clears the view
    Entity { id: Option<u32> },
    Width { width: NonZeroU32 },
    Difficulty { difficulty: DifficultySelect },
    Range { min: u32, max: u32 },
    Threshold { threshold: f64 },
    Mode {
        #[arg(long)]
        heatmap: Option<NormalizationMode>,
        #[arg(long)]
        histogram: Option<NormalizationMode>,
    },
    /// Add or remove one category from the selection
    Toggle { category: u32 },
    /// Replace the selection; no ids selects every available category
    Select { categories: Vec<u32> },
    Show {
        #[arg(long)]
        json: bool,
    },
    Status,
    /// Write the current controls to the config file
    Save,
    Exit,
}

async fn respond(line: &str, session: &Session) -> Result<bool, String> {
    let args = shlex::split(line).ok_or("error: Invalid quoting")?;
    let repl = Repl::try_parse_from(args).map_err(|e| e.to_string())?;
    let controller = &session.controller;

    match repl.command {
        Some(Commands::Entity { id }) => {
            controller.set_entity(id).await;
        }
        Some(Commands::Width { width }) => {
            controller.set_bucket_width(width).await;
        }
        Some(Commands::Difficulty { difficulty }) => {
            controller.set_difficulty(difficulty).await;
        }
        Some(Commands::Range { min, max }) => {
            controller.set_period_range(PeriodRange::new(min, max)).await;
        }
        Some(Commands::Threshold { threshold }) => {
            controller.set_hide_threshold(threshold).await;
        }
        Some(Commands::Mode { heatmap, histogram }) => {
            if let Some(mode) = heatmap {
                controller.set_heatmap_mode(mode).await;
            }
            if let Some(mode) = histogram {
                controller.set_histogram_mode(mode).await;
            }
        }
        Some(Commands::Toggle { category }) => {
            controller.toggle_category(category).await;
        }
        Some(Commands::Select { categories }) if categories.is_empty() => {
            commands::select_all(controller).await;
        }
        Some(Commands::Select { categories }) => {
            controller
                .set_selected_categories(categories.into_iter().collect())
                .await;
        }
        Some(Commands::Show { json }) => {
            commands::show(controller, json).await?;
            return Ok(false);
        }
        Some(Commands::Status) => {}
        Some(Commands::Save) => {
            commands::save(session).await?;
            return Ok(false);
        }
        Some(Commands::Exit) => return Ok(true),
        None => return Ok(false),
    }

    commands::status(controller).await;
    Ok(false)
}
