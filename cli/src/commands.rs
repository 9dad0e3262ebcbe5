use rankmap_core::{ChartController, save_config};
use rankmap_types::formatting::{format_cell, format_compact_f64};
use rankmap_types::{ChartData, NormalizationMode};

use crate::Session;

/// Select every category the last refresh produced.
pub async fn select_all(controller: &ChartController) {
    let available = controller.state().available_categories;
    controller.set_selected_categories(available).await;
}

pub async fn status(controller: &ChartController) {
    let state = controller.state();
    let controls = controller.controls().await;

    match controls.entity {
        Some(entity) => println!("Entity {entity}"),
        None => println!("No entity selected"),
    }
    println!(
        "  width {}, difficulty {}, periods {}-{} (dataset {}-{}), threshold {}",
        controls.bucket_width,
        controls.difficulty,
        controls.period_range.min,
        controls.period_range.max,
        state.full_period_range.min,
        state.full_period_range.max,
        format_compact_f64(controls.hide_threshold, false),
    );
    println!(
        "  heatmap {}, histograms {}",
        controls.heatmap_mode, controls.histogram_mode
    );
    println!(
        "  categories {:?}, selected {:?}",
        state.available_categories, state.selected_categories
    );
    if let Some(error) = &state.error {
        println!("  error: {error}");
    }
}

/// Print the combined view of the selection.
pub async fn show(controller: &ChartController, json: bool) -> Result<(), String> {
    let view = controller.combined_view();

    if json {
        let out = serde_json::to_string_pretty(&view).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    // Format with the modes the view was computed with, not pending controls
    let state = controller.state();
    match view {
        Some(view) if !view.heatmap.is_empty() => {
            print!("{}", render_table(&view, state.heatmap_mode, state.histogram_mode));
        }
        _ => println!("Nothing to show: select at least one category with data"),
    }
    Ok(())
}

pub async fn save(session: &Session) -> Result<(), String> {
    let mut config = session.base_config.clone();
    config.controls = session.controller.controls().await;
    save_config(session.config_path.as_deref(), &config).map_err(|e| e.to_string())?;
    println!("Saved");
    Ok(())
}

/// Heatmap with the row histogram as the last column and the column
/// histogram as the last row.
fn render_table(
    view: &ChartData,
    heatmap_mode: NormalizationMode,
    histogram_mode: NormalizationMode,
) -> String {
    let heatmap = &view.heatmap;

    let mut out = match heatmap_mode.fixed_scale() {
        Some((min, max)) => format!(
            "heatmap {heatmap_mode} (scale {}-{}), {} cells\n",
            format_compact_f64(min, false),
            format_compact_f64(max, false),
            view.defined_cells()
        ),
        None => format!("heatmap {heatmap_mode}, {} cells\n", view.defined_cells()),
    };

    let mut table: Vec<Vec<String>> = Vec::with_capacity(heatmap.rows.len() + 2);
    let mut header = vec!["rank".to_string()];
    header.extend(heatmap.cols.iter().cloned());
    header.push("Σ".to_string());
    table.push(header);

    for (i, label) in heatmap.rows.iter().enumerate() {
        let mut line = vec![label.clone()];
        line.extend(
            (0..heatmap.cols.len()).map(|c| format_cell(heatmap.cell(i, c), heatmap_mode, false)),
        );
        line.push(format_cell(
            view.row_histogram.values.get(i).copied(),
            histogram_mode,
            false,
        ));
        table.push(line);
    }

    let mut footer = vec!["Σ".to_string()];
    footer.extend(
        view.column_histogram
            .values
            .iter()
            .map(|v| format_cell(Some(*v), histogram_mode, false)),
    );
    footer.push(String::new());
    table.push(footer);

    let widths: Vec<usize> = (0..table[0].len())
        .map(|col| {
            table
                .iter()
                .filter_map(|line| line.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for line in &table {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:>width$}"))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}
