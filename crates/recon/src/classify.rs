use crate::config::ReportColumns;
use crate::model::{PartKey, ReportRow, SheetGrid};

/// Classify one physical report row. Returns `None` when the part-key cell
/// is blank or the indentation cell is not a non-negative integer — such
/// rows take no part in the hierarchy at all. Lenient by design, never an
/// error.
pub fn classify_row(grid: &SheetGrid, row: u32, cols: &ReportColumns) -> Option<ReportRow> {
    let part = PartKey::parse(grid.cell(row, cols.part))?;
    let level = parse_level(grid.cell(row, cols.level))?;
    Some(ReportRow {
        row,
        part,
        level,
        qty_text: grid.cell(row, cols.qty).trim().to_string(),
    })
}

fn parse_level(raw: &str) -> Option<u32> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let n: i64 = t.parse().ok()?;
    u32::try_from(n).ok()
}
