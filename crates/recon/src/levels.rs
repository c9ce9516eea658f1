use std::collections::BTreeMap;

use crate::model::PartKey;

/// Most recent occupant of each indentation level during a forward scan.
///
/// Occupants come in two kinds: recognized parents, which later deeper rows
/// can resolve through `parent_of`, and opaque rows, which hold the level
/// (overwriting a sibling, invalidating deeper levels) without ever acting
/// as a parent. Recording at level L purges every occupant strictly deeper
/// than L — once indentation moves back up, the old deeper context is stale
/// and must not capture later rows that return to that depth.
#[derive(Debug, Default)]
pub struct LevelTracker {
    occupants: BTreeMap<u32, Occupant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Occupant {
    Parent(PartKey),
    Opaque,
}

impl LevelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolvable parent at `level`.
    pub fn record_parent(&mut self, level: u32, key: PartKey) {
        self.truncate_deeper(level);
        self.occupants.insert(level, Occupant::Parent(key));
    }

    /// Occupy `level` without becoming resolvable.
    pub fn record_opaque(&mut self, level: u32) {
        self.truncate_deeper(level);
        self.occupants.insert(level, Occupant::Opaque);
    }

    /// Structural parent for a row at `level`: the resolvable occupant one
    /// level up. `level` 0 has no parent by construction.
    pub fn parent_of(&self, level: u32) -> Option<&PartKey> {
        let above = level.checked_sub(1)?;
        match self.occupants.get(&above) {
            Some(Occupant::Parent(key)) => Some(key),
            _ => None,
        }
    }

    fn truncate_deeper(&mut self, level: u32) {
        self.occupants.retain(|&l, _| l <= level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PartKey {
        PartKey::parse(s).unwrap()
    }

    #[test]
    fn resolves_one_level_up() {
        let mut t = LevelTracker::new();
        t.record_parent(0, key("P0"));
        t.record_parent(1, key("P1"));
        assert_eq!(t.parent_of(1), Some(&key("P0")));
        assert_eq!(t.parent_of(2), Some(&key("P1")));
    }

    #[test]
    fn level_zero_has_no_parent() {
        let mut t = LevelTracker::new();
        t.record_parent(0, key("P0"));
        assert_eq!(t.parent_of(0), None);
    }

    #[test]
    fn recording_purges_stale_deeper_levels() {
        let mut t = LevelTracker::new();
        t.record_parent(1, key("A"));
        t.record_parent(2, key("B"));
        t.record_parent(3, key("C"));
        t.record_parent(1, key("D"));

        // old occupants at 2 and 3 are gone
        assert_eq!(t.parent_of(3), None);
        assert_eq!(t.parent_of(4), None);
        // level 2 resolves through the fresh level-1 occupant, never "A"
        assert_eq!(t.parent_of(2), Some(&key("D")));
    }

    #[test]
    fn opaque_rows_hold_but_do_not_resolve() {
        let mut t = LevelTracker::new();
        t.record_parent(1, key("A"));
        t.record_opaque(1);
        assert_eq!(t.parent_of(2), None);
    }

    #[test]
    fn opaque_rows_still_invalidate_deeper_levels() {
        let mut t = LevelTracker::new();
        t.record_parent(1, key("A"));
        t.record_parent(2, key("B"));
        t.record_opaque(1);
        assert_eq!(t.parent_of(3), None);
    }

    #[test]
    fn level_jump_leaves_a_gap() {
        let mut t = LevelTracker::new();
        t.record_parent(1, key("A"));
        // next row arrives at level 3; level 2 was never recorded
        assert_eq!(t.parent_of(3), None);
    }

    #[test]
    fn same_level_sibling_overwrites() {
        let mut t = LevelTracker::new();
        t.record_parent(1, key("A"));
        t.record_parent(1, key("B"));
        assert_eq!(t.parent_of(2), Some(&key("B")));
    }
}
