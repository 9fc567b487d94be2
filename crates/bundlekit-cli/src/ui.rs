//! Summary tables for `bundlekit split` and `bundlekit shard`.

use bundlekit_core::targeting::targeting_suffix;
use bundlekit_schema::ModuleSplit;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

/// One written archive.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub file: String,
    pub module: String,
    pub split_type: String,
    pub targeting: String,
    pub entries: usize,
    pub size: u64,
}

impl SummaryRow {
    pub fn new(split: &ModuleSplit, file: String, size: u64) -> Self {
        let targeting = targeting_suffix(&split.apk_targeting);
        Self {
            file,
            module: split.module_name.to_string(),
            split_type: split.split_type.to_string(),
            targeting: if targeting.is_empty() {
                "master".to_string()
            } else {
                targeting
            },
            entries: split.entries.len(),
            size,
        }
    }
}

pub fn summary_table(rows: &[SummaryRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["file", "module", "type", "targeting", "entries", "size"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.file),
            Cell::new(&row.module),
            Cell::new(&row.split_type),
            Cell::new(&row.targeting),
            Cell::new(row.entries).set_alignment(CellAlignment::Right),
            Cell::new(format_size(row.size)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn print_summary(rows: &[SummaryRow]) {
    println!("{}", summary_table(rows));
    let total: u64 = rows.iter().map(|r| r.size).sum();
    println!("  {} archives, {}", rows.len(), format_size(total));
}

/// Format bytes for human-readable display
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
