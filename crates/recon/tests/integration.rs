use std::path::PathBuf;

use bomcheck_recon::config::CheckConfig;
use bomcheck_recon::engine::run;
use bomcheck_recon::model::{CheckInput, FindingReason, MatchRoute, SheetGrid, Verdict};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Report grid from (part, level, category, alt label, qty) rows, laid out
/// per `config.report`, first data row first.
fn report_grid(config: &CheckConfig, rows: &[(&str, &str, &str, &str, &str)]) -> SheetGrid {
    let cols = &config.report;
    let mut g = SheetGrid::new(config.sheets.report.clone());
    for (i, (part, level, category, alt, qty)) in rows.iter().enumerate() {
        let row = i as u32 + cols.first_row;
        g.set_cell(row, cols.part, *part);
        g.set_cell(row, cols.level, *level);
        g.set_cell(row, cols.category, *category);
        g.set_cell(row, cols.alt_label, *alt);
        g.set_cell(row, cols.qty, *qty);
    }
    g
}

/// Parts-list grid from (key, desc, qty) rows.
fn parts_grid(config: &CheckConfig, rows: &[(&str, &str, &str)]) -> SheetGrid {
    let cols = &config.parts_list;
    let mut g = SheetGrid::new(config.sheets.parts_list.clone());
    for (i, (key, desc, qty)) in rows.iter().enumerate() {
        let row = i as u32 + cols.first_row;
        g.set_cell(row, cols.key, *key);
        g.set_cell(row, cols.desc, *desc);
        g.set_cell(row, cols.qty, *qty);
    }
    g
}

// -------------------------------------------------------------------------
// Minimal end-to-end
// -------------------------------------------------------------------------

#[test]
fn attached_child_with_equal_qty_gets_pass_fill() {
    let config = CheckConfig::default();
    let input = CheckInput {
        report: report_grid(
            &config,
            &[
                ("P1", "1", "", "", ""),
                ("C1", "2", "", "", "4"),
            ],
        ),
        parts_list: parts_grid(
            &config,
            &[
                ("P1", "", ""),
                ("C1", "bolt", "4"),
            ],
        ),
    };

    let result = run(&config, &input).unwrap();

    assert_eq!(result.fills.len(), 1);
    assert_eq!(result.fills[0].row, 3);
    assert_eq!(result.fills[0].col, config.report.qty);
    assert_eq!(result.fills[0].verdict, Verdict::Pass);

    // P1 itself sits at level 1 with no level-0 context: reported, not lost
    assert_eq!(result.summary.orphan_rows, 1);
    assert_eq!(result.orphans[0].row, 2);
}

// -------------------------------------------------------------------------
// Full workbook story
// -------------------------------------------------------------------------

#[test]
fn mixed_workbook_reconciles_every_route() {
    let config = CheckConfig::default();
    let input = CheckInput {
        report: report_grid(
            &config,
            &[
                ("IR5678", "0", "", "", ""),      // row 2: root assembly
                ("C1", "1", "", "", "4"),         // row 3: direct PASS
                ("AIR12", "1", "", "", "2"),      // row 4: alias-filed PASS
                ("X9", "1", "", "", "7"),         // row 5: direct miss
                ("ALT", "1", "TP", "K100", ""),   // row 6: rescue for X9
                ("P2", "0", "", "", ""),          // row 7: second root
                ("D1", "1", "", "", "9"),         // row 8: qty mismatch
                ("LOST", "2", "", "", "1"),       // row 9: orphan (D1 is opaque)
            ],
        ),
        parts_list: parts_grid(
            &config,
            &[
                ("GF5678", "", ""),
                ("AIR12", "vent", "2"),
                ("IR5678", "", ""),
                ("C1", "bolt", "4"),
                ("K100", "clip", "7"),
                ("CA-NOTE", "admin", "1"),
                ("P2", "", ""),
                ("D1", "pin", "1"),
            ],
        ),
    };

    let result = run(&config, &input).unwrap();
    let s = &result.summary;

    assert_eq!(s.parents_seen, 3, "GF5678, IR5678 and P2 buckets");
    assert_eq!(s.children_checked, 4);
    assert_eq!(s.passed, 3);
    assert_eq!(s.failed, 1);
    assert_eq!(s.orphan_rows, 1);
    assert_eq!(s.dangling_alternate_rows, 0);
    assert_eq!(s.cells_annotated, 4);
    assert_eq!(s.reason_counts["qty_equal"], 3);
    assert_eq!(s.reason_counts["qty_mismatch"], 1);

    // the alias child landed in the redirected bucket
    let alias = result
        .findings
        .iter()
        .find(|f| f.part.as_str() == "AIR12")
        .unwrap();
    assert_eq!(alias.parent.as_str(), "GF5678");
    assert_eq!(alias.verdict, Verdict::Pass);

    // the TP label rescued X9 and consumed K100
    let rescued = result
        .findings
        .iter()
        .find(|f| f.part.as_str() == "X9")
        .unwrap();
    assert_eq!(rescued.route, Some(MatchRoute::TpAlias));
    assert_eq!(rescued.matched_key.as_ref().unwrap().as_str(), "K100");

    // the CA row never entered the pool
    assert!(result
        .findings
        .iter()
        .all(|f| f.matched_key.as_ref().map(|k| k.as_str()) != Some("CA-NOTE")));

    // mismatch drove a FAIL fill on the quantity cell of row 8
    let fail = result.fills.iter().find(|f| f.row == 8).unwrap();
    assert_eq!(fail.verdict, Verdict::Fail);
    assert_eq!(fail.col, config.report.qty);

    // the orphan got no fill at all
    assert!(result.fills.iter().all(|f| f.row != 9));
    assert_eq!(result.orphans[0].part.as_str(), "LOST");
}

// -------------------------------------------------------------------------
// Config-driven layouts
// -------------------------------------------------------------------------

#[test]
fn fixture_config_relocates_every_column() {
    let toml = std::fs::read_to_string(fixtures_dir().join("weekly-check.toml")).unwrap();
    let config = CheckConfig::from_toml(&toml).unwrap();
    assert_eq!(config.name, "weekly build check");
    assert_eq!(config.sheets.report, "Build Report");
    assert_eq!(config.report.part, 2);
    assert_eq!(config.report.qty, 5);

    let input = CheckInput {
        report: report_grid(
            &config,
            &[
                ("P1", "0", "", "", ""),
                ("C1", "1", "", "", "4"),
            ],
        ),
        parts_list: parts_grid(
            &config,
            &[
                ("P1", "", ""),
                ("C1", "bolt", "4"),
            ],
        ),
    };

    let result = run(&config, &input).unwrap();
    assert_eq!(result.summary.passed, 1);
    assert_eq!(result.fills[0].col, 5);
    assert_eq!(result.meta.report_sheet, "Build Report");
}

#[test]
fn consumption_respects_list_order_across_duplicates() {
    let config = CheckConfig::default();
    let input = CheckInput {
        report: report_grid(
            &config,
            &[
                ("P1", "0", "", "", ""),
                ("X1", "1", "", "", "3"),
                ("X1", "1", "", "", "5"),
            ],
        ),
        parts_list: parts_grid(
            &config,
            &[
                ("P1", "", ""),
                ("X1", "bolt", "3"),
                ("X1", "bolt", "5"),
            ],
        ),
    };

    let result = run(&config, &input).unwrap();
    assert_eq!(result.summary.passed, 2);
    assert_eq!(result.summary.failed, 0);
}

#[test]
fn empty_sheets_produce_an_empty_clean_result() {
    let config = CheckConfig::default();
    let input = CheckInput {
        report: SheetGrid::new("Report Data"),
        parts_list: SheetGrid::new("EPL Data"),
    };

    let result = run(&config, &input).unwrap();
    assert_eq!(result.summary.children_checked, 0);
    assert_eq!(result.summary.orphan_rows, 0);
    assert!(result.fills.is_empty());
    assert!(result.findings.is_empty());
}

#[test]
fn unmatched_child_fails_but_processing_continues() {
    let config = CheckConfig::default();
    let input = CheckInput {
        report: report_grid(
            &config,
            &[
                ("P1", "0", "", "", ""),
                ("GHOST", "1", "", "", "4"),
                ("C1", "1", "", "", "4"),
            ],
        ),
        parts_list: parts_grid(
            &config,
            &[
                ("P1", "", ""),
                ("C1", "bolt", "4"),
            ],
        ),
    };

    let result = run(&config, &input).unwrap();
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.summary.passed, 1);

    let ghost = result
        .findings
        .iter()
        .find(|f| f.part.as_str() == "GHOST")
        .unwrap();
    assert_eq!(ghost.reason, FindingReason::NoMatch);
    assert!(ghost.list_qty.is_none());
}
