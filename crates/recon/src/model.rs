use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Normalized part identifier: trimmed, inner whitespace collapsed to single
/// spaces, upper-cased. Equality is exact string equality post-normalization.
/// Not unique across a document: the same key may appear as a parent in one
/// place and a child in another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PartKey(String);

impl PartKey {
    /// Normalize raw cell text into a key. Blank text yields `None`.
    pub fn parse(raw: &str) -> Option<PartKey> {
        let mut words = raw.split_whitespace();
        let first = words.next()?;
        let mut s = String::with_capacity(raw.len());
        s.push_str(first);
        for w in words {
            s.push(' ');
            s.push_str(w);
        }
        Some(PartKey(s.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Input grids
// ---------------------------------------------------------------------------

/// One sheet's cell contents as text, addressed 1-based like the spreadsheet
/// itself. Reads outside the populated area are empty strings.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    name: String,
    // rows[0] is spreadsheet row 1
    rows: Vec<Vec<String>>,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>) -> Self {
        SheetGrid {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell text at a 1-based (row, col).
    pub fn cell(&self, row: u32, col: u32) -> &str {
        if row == 0 || col == 0 {
            return "";
        }
        self.rows
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Write a cell at a 1-based (row, col), growing the grid as needed.
    pub fn set_cell(&mut self, row: u32, col: u32, value: impl Into<String>) {
        if row == 0 || col == 0 {
            return;
        }
        let (r, c) = (row as usize - 1, col as usize - 1);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize(c + 1, String::new());
        }
        cells[c] = value.into();
    }

    /// Highest populated 1-based row number, 0 when the sheet is empty.
    pub fn last_row(&self) -> u32 {
        self.rows.len() as u32
    }
}

/// Pre-loaded sheets for one verification run.
#[derive(Debug, Clone)]
pub struct CheckInput {
    pub report: SheetGrid,
    pub parts_list: SheetGrid,
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// One classified report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub row: u32,
    pub part: PartKey,
    pub level: u32,
    pub qty_text: String,
}

/// A child attached to one parent bucket. `tp_rows` / `lp_rows` carry the
/// trailing alternate-key row numbers, consulted in that order when the
/// direct key match fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub part: PartKey,
    pub qty_row: u32,
    pub qty_text: String,
    pub tp_rows: Vec<u32>,
    pub lp_rows: Vec<u32>,
}

/// Parent key → children in scan order. BTreeMap keeps parent iteration
/// deterministic across runs.
pub type ParentMap = BTreeMap<PartKey, Vec<ChildEntry>>;

/// Report row that could not be attached to any parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRow {
    pub row: u32,
    pub part: PartKey,
    pub level: u32,
}

// ---------------------------------------------------------------------------
// Reference list
// ---------------------------------------------------------------------------

/// One (key, quantity text) pair under a parts-list parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPair {
    pub key: PartKey,
    pub qty_text: String,
}

/// Parts-list output: child pairs grouped by parent, plus every marker key
/// (markers with empty runs included — they still anchor the hierarchy).
#[derive(Debug, Clone, Default)]
pub struct ReferenceList {
    pub groups: BTreeMap<PartKey, Vec<RefPair>>,
    pub parents: BTreeSet<PartKey>,
}

// ---------------------------------------------------------------------------
// Verdicts + annotations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Fill annotation for one report-sheet cell, 1-based coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellFill {
    pub row: u32,
    pub col: u32,
    pub verdict: Verdict,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Which lookup step produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRoute {
    Direct,
    TpAlias,
    LpAlias,
}

impl fmt::Display for MatchRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::TpAlias => write!(f, "tp_alias"),
            Self::LpAlias => write!(f, "lp_alias"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingReason {
    QtyEqual,
    QtyMismatch,
    QtyUnreadable,
    NoMatch,
}

impl fmt::Display for FindingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QtyEqual => write!(f, "qty_equal"),
            Self::QtyMismatch => write!(f, "qty_mismatch"),
            Self::QtyUnreadable => write!(f, "qty_unreadable"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

/// One reconciled child row.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub parent: PartKey,
    pub part: PartKey,
    pub row: u32,
    pub verdict: Verdict,
    pub reason: FindingReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<MatchRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_key: Option<PartKey>,
    pub report_qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_qty: Option<String>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub parents_seen: usize,
    pub children_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub orphan_rows: usize,
    pub dangling_alternate_rows: usize,
    pub cells_annotated: usize,
    pub reason_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub meta: CheckMeta,
    pub summary: CheckSummary,
    pub findings: Vec<Finding>,
    pub orphans: Vec<OrphanRow>,
    pub fills: Vec<CellFill>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckMeta {
    pub config_name: String,
    pub report_sheet: String,
    pub parts_sheet: String,
    pub engine_version: String,
    pub run_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_key_normalizes() {
        assert_eq!(PartKey::parse("  ir5678 ").unwrap().as_str(), "IR5678");
        assert_eq!(PartKey::parse("gf  12\t34").unwrap().as_str(), "GF 12 34");
        assert_eq!(PartKey::parse("AIR12").unwrap().as_str(), "AIR12");
    }

    #[test]
    fn part_key_blank_is_none() {
        assert!(PartKey::parse("").is_none());
        assert!(PartKey::parse("   ").is_none());
        assert!(PartKey::parse("\t\n").is_none());
    }

    #[test]
    fn part_key_equality_after_normalization() {
        assert_eq!(PartKey::parse("x1").unwrap(), PartKey::parse(" X1 ").unwrap());
    }

    #[test]
    fn grid_is_one_based_and_sparse() {
        let mut g = SheetGrid::new("Report Data");
        g.set_cell(3, 2, "B3");
        assert_eq!(g.cell(3, 2), "B3");
        assert_eq!(g.cell(1, 1), "");
        assert_eq!(g.cell(99, 99), "");
        assert_eq!(g.cell(0, 1), "");
        assert_eq!(g.last_row(), 3);
    }

}
