use std::collections::{BTreeMap, BTreeSet};

use crate::classify::classify_row;
use crate::config::ReportColumns;
use crate::levels::LevelTracker;
use crate::model::{ChildEntry, OrphanRow, ParentMap, PartKey, SheetGrid};

/// Child keys in this family file under a redirected parent family.
pub const ALIAS_CHILD_PREFIX: &str = "AIR";
/// Infix removed from the structural parent's key during redirection.
pub const ALIAS_PARENT_INFIX: &str = "IR";
/// Prefix of the redirected parent key.
pub const ALIAS_PARENT_PREFIX: &str = "GF";

/// Category tags marking a row as alternate-key metadata for the child above.
pub const CATEGORY_TP: &str = "TP";
pub const CATEGORY_LP: &str = "LP";

#[derive(Debug, Default)]
pub struct HierarchyOutput {
    pub buckets: ParentMap,
    pub orphans: Vec<OrphanRow>,
    /// TP/LP rows with no preceding child at their level to attach to.
    pub dangling_alternate_rows: Vec<u32>,
}

/// Effective parent for an alias-prefixed child: remove the first `"IR"`
/// from the structural parent's key and prepend `"GF"` — `"IR5678"`
/// becomes `"GF5678"`. A filing convention in the source data; the string
/// surgery is fixed and must not be generalized.
pub fn redirect_alias_parent(structural: &PartKey) -> PartKey {
    let base = structural.as_str().replacen(ALIAS_PARENT_INFIX, "", 1);
    match PartKey::parse(&format!("{ALIAS_PARENT_PREFIX}{base}")) {
        Some(key) => key,
        None => structural.clone(),
    }
}

/// Single forward scan over the report sheet: reconstruct parent buckets
/// via the level tracker, apply alias redirection, capture TP/LP metadata
/// rows, and collect structural orphans.
///
/// Only members of `valid_parents` become resolvable in the tracker; other
/// rows occupy their level opaquely. Rows at level 0 are roots, never
/// orphans.
pub fn build_hierarchy(
    grid: &SheetGrid,
    cols: &ReportColumns,
    valid_parents: &BTreeSet<PartKey>,
) -> HierarchyOutput {
    let mut tracker = LevelTracker::new();
    let mut buckets = ParentMap::new();
    let mut orphans = Vec::new();
    let mut dangling_alternate_rows = Vec::new();
    // most recently created child at each level, as (bucket key, index)
    let mut last_child: BTreeMap<u32, (PartKey, usize)> = BTreeMap::new();

    for row in cols.first_row..=grid.last_row() {
        let Some(r) = classify_row(grid, row, cols) else {
            continue;
        };

        // TP/LP rows are metadata trailing the previous child at this
        // level: no child entry, no tracker update.
        if let Some(tag) = PartKey::parse(grid.cell(row, cols.category)) {
            if tag.as_str() == CATEGORY_TP || tag.as_str() == CATEGORY_LP {
                let target = last_child
                    .get(&r.level)
                    .and_then(|(pk, idx)| buckets.get_mut(pk).and_then(|b| b.get_mut(*idx)));
                match target {
                    Some(entry) if tag.as_str() == CATEGORY_TP => entry.tp_rows.push(row),
                    Some(entry) => entry.lp_rows.push(row),
                    None => dangling_alternate_rows.push(row),
                }
                continue;
            }
        }

        let structural = tracker.parent_of(r.level).cloned();
        let effective = match structural {
            Some(ref p) if r.part.starts_with(ALIAS_CHILD_PREFIX) => {
                Some(redirect_alias_parent(p))
            }
            other => other,
        };

        match effective {
            Some(parent) => {
                let bucket = buckets.entry(parent.clone()).or_default();
                bucket.push(ChildEntry {
                    part: r.part.clone(),
                    qty_row: r.row,
                    qty_text: r.qty_text.clone(),
                    tp_rows: Vec::new(),
                    lp_rows: Vec::new(),
                });
                last_child.retain(|&l, _| l <= r.level);
                last_child.insert(r.level, (parent, bucket.len() - 1));
            }
            None => {
                if r.level > 0 {
                    orphans.push(OrphanRow {
                        row: r.row,
                        part: r.part.clone(),
                        level: r.level,
                    });
                }
                // an unattached row still breaks the trailing-metadata chain
                last_child.retain(|&l, _| l <= r.level);
                last_child.remove(&r.level);
            }
        }

        if valid_parents.contains(&r.part) && !r.part.starts_with(ALIAS_CHILD_PREFIX) {
            tracker.record_parent(r.level, r.part);
        } else {
            tracker.record_opaque(r.level);
        }
    }

    HierarchyOutput {
        buckets,
        orphans,
        dangling_alternate_rows,
    }
}
