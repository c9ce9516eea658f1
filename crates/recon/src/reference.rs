use crate::config::PartsListColumns;
use crate::model::{PartKey, RefPair, ReferenceList, SheetGrid};

/// Keys with this prefix inside a parent's run are administrative notes,
/// never children.
pub const SKIP_CHILD_PREFIX: &str = "CA";

/// Scan the parts-list sheet top-to-bottom. A row whose key cell is
/// non-empty while its quantity and description cells are blank is a parent
/// marker; every following row belongs to that marker until the next one.
/// Rows before the first marker are ignored.
pub fn build_reference_list(grid: &SheetGrid, cols: &PartsListColumns) -> ReferenceList {
    let mut list = ReferenceList::default();
    let mut current: Option<PartKey> = None;

    for row in cols.first_row..=grid.last_row() {
        let key = PartKey::parse(grid.cell(row, cols.key));
        let qty_text = grid.cell(row, cols.qty).trim();
        let desc_blank = grid.cell(row, cols.desc).trim().is_empty();

        if qty_text.is_empty() && desc_blank {
            if let Some(marker) = key {
                list.parents.insert(marker.clone());
                current = Some(marker);
                continue;
            }
        }

        let Some(ref parent) = current else {
            continue;
        };
        let Some(child) = key else {
            continue;
        };
        if child.starts_with(SKIP_CHILD_PREFIX) {
            continue;
        }

        list.groups.entry(parent.clone()).or_default().push(RefPair {
            key: child,
            qty_text: qty_text.to_string(),
        });
    }

    list
}
