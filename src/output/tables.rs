use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Duration in minutes, colored against `baseline` (the dataset median).
pub fn color_coded_duration_cell(minutes: f64, baseline: f64) -> Cell {
    Cell::new(format_minutes(minutes)).fg(duration_color(minutes, baseline))
}

/// Green up to the baseline, yellow up to 25% above it, red beyond.
fn duration_color(minutes: f64, baseline: f64) -> TableColor {
    if minutes <= baseline {
        TableColor::Green
    } else if minutes <= baseline * 1.25 {
        TableColor::Yellow
    } else {
        TableColor::Red
    }
}

pub fn format_minutes(minutes: f64) -> String {
    format!("{minutes:.2}min")
}
