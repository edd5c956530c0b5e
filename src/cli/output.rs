//! Output formatting for inspection subcommands: human-readable by
//! default, `--json` for machine consumption.

use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Standard list table: one header row, left-aligned, no borders.
pub fn list_table(headers: &[&str]) -> comfy_table::Table {
    use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}
