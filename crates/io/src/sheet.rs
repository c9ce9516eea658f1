// Sheet extraction: calamine workbook -> engine grids

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use bomcheck_recon::config::CheckConfig;
use bomcheck_recon::model::{CheckInput, SheetGrid};

use crate::error::WorkbookError;

/// Load the two configured sheets into engine grids.
///
/// Both sheets are verified to exist before any cell is read; a missing
/// sheet is fatal and the error lists what the workbook actually has.
pub fn load_input(path: &Path, config: &CheckConfig) -> Result<CheckInput, WorkbookError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| WorkbookError::Open {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;

    let available: Vec<String> = workbook.sheet_names().to_vec();
    for name in [&config.sheets.report, &config.sheets.parts_list] {
        if !available.iter().any(|n| n == name) {
            return Err(WorkbookError::MissingSheet {
                name: name.clone(),
                available,
            });
        }
    }

    let report = load_grid(&mut workbook, &config.sheets.report)?;
    let parts_list = load_grid(&mut workbook, &config.sheets.parts_list)?;
    Ok(CheckInput { report, parts_list })
}

fn load_grid(
    workbook: &mut Sheets<BufReader<File>>,
    name: &str,
) -> Result<SheetGrid, WorkbookError> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|e| WorkbookError::Invalid(format!("cannot read sheet '{name}': {e}")))?;

    // Range start offset (data may not begin at A1); grid rows stay absolute.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let mut grid = SheetGrid::new(name);
    for (row_idx, row) in range.rows().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let text = cell_text(cell);
            if text.is_empty() {
                continue;
            }
            grid.set_cell(
                start_row + row_idx as u32 + 1,
                start_col + col_idx as u32 + 1,
                text,
            );
        }
    }
    Ok(grid)
}

/// Render one calamine cell as grid text.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;
    use tempfile::NamedTempFile;

    fn sample_workbook() -> NamedTempFile {
        let file = NamedTempFile::with_suffix(".xlsx").unwrap();
        let mut workbook = XlsxWorkbook::new();

        // Columns per default config: part=J, level=I, qty=N (0-based 9/8/13)
        let report = workbook.add_worksheet().set_name("Report Data").unwrap();
        report.write_string(1, 9, "P1").unwrap();
        report.write_number(1, 8, 0.0).unwrap();
        report.write_string(2, 9, "C1").unwrap();
        report.write_number(2, 8, 1.0).unwrap();
        report.write_number(2, 13, 4.0).unwrap();

        let parts = workbook.add_worksheet().set_name("EPL Data").unwrap();
        parts.write_string(1, 0, "P1").unwrap();
        parts.write_string(2, 0, "C1").unwrap();
        parts.write_string(2, 1, "bolt").unwrap();
        parts.write_number(2, 2, 4.0).unwrap();

        workbook.save(file.path()).unwrap();
        file
    }

    #[test]
    fn loads_grids_with_absolute_positions() {
        let file = sample_workbook();
        let config = CheckConfig::default();

        let input = load_input(file.path(), &config).unwrap();
        assert_eq!(input.report.name(), "Report Data");
        assert_eq!(input.parts_list.name(), "EPL Data");
        assert_eq!(input.report.cell(2, 10), "P1");
        assert_eq!(input.report.cell(3, 10), "C1");
        assert_eq!(input.parts_list.cell(3, 2), "bolt");
    }

    #[test]
    fn numeric_cells_render_without_trailing_zero() {
        let file = sample_workbook();
        let config = CheckConfig::default();

        let input = load_input(file.path(), &config).unwrap();
        assert_eq!(input.report.cell(3, 9), "1");
        assert_eq!(input.report.cell(3, 14), "4");
    }

    #[test]
    fn missing_sheet_is_fatal_and_lists_names() {
        let file = sample_workbook();
        let mut config = CheckConfig::default();
        config.sheets.report = "Weekly Report".to_string();

        let err = load_input(file.path(), &config).unwrap_err();
        match err {
            WorkbookError::MissingSheet { name, available } => {
                assert_eq!(name, "Weekly Report");
                assert!(available.contains(&"Report Data".to_string()));
                assert!(available.contains(&"EPL Data".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unreadable_path_is_an_open_error() {
        let config = CheckConfig::default();
        let err = load_input(Path::new("/nonexistent/book.xlsx"), &config).unwrap_err();
        assert!(matches!(err, WorkbookError::Open { .. }));
    }
}
