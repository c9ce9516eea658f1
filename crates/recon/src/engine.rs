use std::collections::BTreeMap;

use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::hierarchy::{build_hierarchy, HierarchyOutput};
use crate::model::{CheckInput, CheckMeta, CheckResult, CheckSummary, Verdict};
use crate::reconcile::{reconcile, ReconcileOutput};
use crate::reference::build_reference_list;

/// Run one verification pass: build the reference list, reconstruct the
/// report hierarchy anchored on the list's parent keys, reconcile, and
/// return findings plus the fill annotations for the caller to apply.
pub fn run(config: &CheckConfig, input: &CheckInput) -> Result<CheckResult, CheckError> {
    config.validate()?;

    let reference = build_reference_list(&input.parts_list, &config.parts_list);
    let hierarchy = build_hierarchy(&input.report, &config.report, &reference.parents);
    let reconciled = reconcile(
        &hierarchy.buckets,
        &reference,
        &input.report,
        &config.report,
        &config.policy,
    );

    let summary = compute_summary(&hierarchy, &reconciled);

    Ok(CheckResult {
        meta: CheckMeta {
            config_name: config.name.clone(),
            report_sheet: config.sheets.report.clone(),
            parts_sheet: config.sheets.parts_list.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        findings: reconciled.findings,
        orphans: hierarchy.orphans,
        fills: reconciled.fills,
    })
}

fn compute_summary(hierarchy: &HierarchyOutput, reconciled: &ReconcileOutput) -> CheckSummary {
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut passed = 0;
    let mut failed = 0;
    for finding in &reconciled.findings {
        match finding.verdict {
            Verdict::Pass => passed += 1,
            Verdict::Fail => failed += 1,
        }
        *reason_counts.entry(finding.reason.to_string()).or_insert(0) += 1;
    }

    CheckSummary {
        parents_seen: hierarchy.buckets.len(),
        children_checked: reconciled.findings.len(),
        passed,
        failed,
        orphan_rows: hierarchy.orphans.len(),
        dangling_alternate_rows: hierarchy.dangling_alternate_rows.len(),
        cells_annotated: reconciled.fills.len(),
        reason_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SheetGrid;

    /// Report grid from (part, level, category, alt, qty) rows, row 2 first.
    fn report(rows: &[(&str, &str, &str, &str, &str)]) -> SheetGrid {
        let config = CheckConfig::default();
        let cols = &config.report;
        let mut g = SheetGrid::new("Report Data");
        for (i, (part, level, category, alt, qty)) in rows.iter().enumerate() {
            let row = i as u32 + 2;
            g.set_cell(row, cols.part, *part);
            g.set_cell(row, cols.level, *level);
            g.set_cell(row, cols.category, *category);
            g.set_cell(row, cols.alt_label, *alt);
            g.set_cell(row, cols.qty, *qty);
        }
        g
    }

    /// Parts-list grid from (key, desc, qty) rows, row 2 first.
    fn parts_list(rows: &[(&str, &str, &str)]) -> SheetGrid {
        let config = CheckConfig::default();
        let cols = &config.parts_list;
        let mut g = SheetGrid::new("EPL Data");
        for (i, (key, desc, qty)) in rows.iter().enumerate() {
            let row = i as u32 + 2;
            g.set_cell(row, cols.key, *key);
            g.set_cell(row, cols.desc, *desc);
            g.set_cell(row, cols.qty, *qty);
        }
        g
    }

    #[test]
    fn clean_pass_run() {
        let input = CheckInput {
            report: report(&[
                ("P1", "0", "", "", ""),
                ("C1", "1", "", "", "4"),
            ]),
            parts_list: parts_list(&[
                ("P1", "", ""),
                ("C1", "bolt", "4"),
            ]),
        };
        let result = run(&CheckConfig::default(), &input).unwrap();

        assert_eq!(result.summary.parents_seen, 1);
        assert_eq!(result.summary.children_checked, 1);
        assert_eq!(result.summary.passed, 1);
        assert_eq!(result.summary.failed, 0);
        assert_eq!(result.summary.orphan_rows, 0);
        assert_eq!(result.summary.cells_annotated, 1);
        assert_eq!(result.summary.reason_counts["qty_equal"], 1);
        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].verdict, Verdict::Pass);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_work() {
        let mut config = CheckConfig::default();
        config.report.qty = config.report.part;

        let input = CheckInput {
            report: report(&[]),
            parts_list: parts_list(&[]),
        };
        let err = run(&config, &input).unwrap_err();
        assert!(matches!(err, CheckError::ConfigValidation(_)));
    }

    #[test]
    fn result_serializes_with_snake_case_tags() {
        let input = CheckInput {
            report: report(&[
                ("P1", "0", "", "", ""),
                ("C1", "1", "", "", "4"),
                ("C2", "1", "", "", "9"),
            ]),
            parts_list: parts_list(&[
                ("P1", "", ""),
                ("C1", "bolt", "4"),
            ]),
        };
        let result = run(&CheckConfig::default(), &input).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["findings"][0]["verdict"], "pass");
        assert_eq!(json["findings"][0]["reason"], "qty_equal");
        assert_eq!(json["findings"][0]["route"], "direct");
        assert_eq!(json["findings"][1]["verdict"], "fail");
        assert_eq!(json["findings"][1]["reason"], "no_match");
        assert_eq!(json["meta"]["report_sheet"], "Report Data");
        assert!(json["meta"]["engine_version"].is_string());
    }

    #[test]
    fn meta_carries_config_name_and_sheets() {
        let mut config = CheckConfig::default();
        config.name = "weekly build check".into();

        let input = CheckInput {
            report: report(&[]),
            parts_list: parts_list(&[]),
        };
        let result = run(&config, &input).unwrap();
        assert_eq!(result.meta.config_name, "weekly build check");
        assert_eq!(result.meta.parts_sheet, "EPL Data");
        assert_eq!(result.summary.children_checked, 0);
    }
}
