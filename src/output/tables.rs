use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::hr_api::CollaboratorStatus;

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

/// Share of collaborators that received a payslip.
pub fn color_coded_coverage_cell(matched: usize, total: usize) -> Cell {
    #[allow(clippy::cast_precision_loss)]
    let rate = if total > 0 {
        matched as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let text = format!("{matched}/{total} ({rate:.1}%)");
    if rate > 80.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if rate >= 50.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn status_cell(status: CollaboratorStatus) -> Cell {
    match status {
        CollaboratorStatus::Active => Cell::new(status).fg(TableColor::Green),
        CollaboratorStatus::Inactive => Cell::new(status).fg(TableColor::DarkGrey),
    }
}

pub fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) if !value.is_empty() => Cell::new(value),
        _ => Cell::new("-").fg(TableColor::DarkGrey),
    }
}
