use crate::config::{MatchPolicy, ReportColumns};
use crate::model::{
    CellFill, Finding, FindingReason, MatchRoute, ParentMap, PartKey, RefPair, ReferenceList,
    SheetGrid, Verdict,
};
use crate::qty::to_int_lenient;

#[derive(Debug, Default)]
pub struct ReconcileOutput {
    pub findings: Vec<Finding>,
    pub fills: Vec<CellFill>,
}

/// Match every attached child against its parent's reference pairs and emit
/// one verdict and one fill annotation per child.
///
/// Lookup order per child: direct key, then the alternate-label column read
/// at each TP row, then at each LP row; the first hit wins. With
/// `consume_matches` a hit removes the pair from the pool, so one reference
/// quantity can never validate two children. PASS requires both quantities
/// to coerce and be equal; no match or an unreadable side is a FAIL, never
/// an error.
pub fn reconcile(
    buckets: &ParentMap,
    reference: &ReferenceList,
    report: &SheetGrid,
    cols: &ReportColumns,
    policy: &MatchPolicy,
) -> ReconcileOutput {
    let mut out = ReconcileOutput::default();

    for (parent, children) in buckets {
        // parents absent from the list read as an empty pool: every child fails
        let mut pool: Vec<RefPair> = reference.groups.get(parent).cloned().unwrap_or_default();

        for child in children {
            let mut matched = take_match(&mut pool, &child.part, policy.consume_matches)
                .map(|p| (p, MatchRoute::Direct));

            if matched.is_none() {
                matched = match_via_alternates(
                    &mut pool,
                    &child.tp_rows,
                    report,
                    cols,
                    policy.consume_matches,
                )
                .map(|p| (p, MatchRoute::TpAlias));
            }
            if matched.is_none() {
                matched = match_via_alternates(
                    &mut pool,
                    &child.lp_rows,
                    report,
                    cols,
                    policy.consume_matches,
                )
                .map(|p| (p, MatchRoute::LpAlias));
            }

            let (verdict, reason, route, matched_key, list_qty) = match matched {
                Some((pair, route)) => {
                    let (verdict, reason) =
                        match (to_int_lenient(&child.qty_text), to_int_lenient(&pair.qty_text)) {
                            (Some(a), Some(b)) if a == b => (Verdict::Pass, FindingReason::QtyEqual),
                            (Some(_), Some(_)) => (Verdict::Fail, FindingReason::QtyMismatch),
                            _ => (Verdict::Fail, FindingReason::QtyUnreadable),
                        };
                    (verdict, reason, Some(route), Some(pair.key), Some(pair.qty_text))
                }
                None => (Verdict::Fail, FindingReason::NoMatch, None, None, None),
            };

            out.fills.push(CellFill {
                row: child.qty_row,
                col: cols.qty,
                verdict,
            });
            out.findings.push(Finding {
                parent: parent.clone(),
                part: child.part.clone(),
                row: child.qty_row,
                verdict,
                reason,
                route,
                matched_key,
                report_qty: child.qty_text.clone(),
                list_qty,
            });
        }
    }

    out
}

/// First unconsumed pair whose key equals `probe`, by list order.
fn take_match(pool: &mut Vec<RefPair>, probe: &PartKey, consume: bool) -> Option<RefPair> {
    let pos = pool.iter().position(|p| p.key == *probe)?;
    if consume {
        Some(pool.remove(pos))
    } else {
        Some(pool[pos].clone())
    }
}

/// Try each alternate row in order: read its alternate-label cell, skip
/// blanks, match the normalized label. Stops at the first hit.
fn match_via_alternates(
    pool: &mut Vec<RefPair>,
    alt_rows: &[u32],
    report: &SheetGrid,
    cols: &ReportColumns,
    consume: bool,
) -> Option<RefPair> {
    for &row in alt_rows {
        let Some(label) = PartKey::parse(report.cell(row, cols.alt_label)) else {
            continue;
        };
        if let Some(pair) = take_match(pool, &label, consume) {
            return Some(pair);
        }
    }
    None
}
