//! Player selection: up to three same-kind tiles picked anywhere on the board.

use crate::grid::{Grid, Tile, TileId, TileKind};
use crate::matcher::MatchSet;

/// Tiles needed to pop.
pub const SELECTION_SIZE: usize = 3;

/// What a pick did to the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The tile is not on the board (already gone, or still in the pending row).
    Ignored,
    /// The tile was selected and has been removed.
    Deselected,
    /// Kind changed (or a full selection was pending): selection restarted with this tile.
    Restarted,
    /// Appended; selection now has this many tiles.
    Added(usize),
    /// The third pick found stale members; they were dropped and this many remain.
    Revalidated(usize),
    /// Three live tiles; the selection is now empty and these go to the cascade.
    Complete(MatchSet),
}

/// Ordered ids, all sharing one kind.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    picks: Vec<(TileId, TileKind)>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.picks.iter().map(|&(id, _)| id)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.picks.iter().any(|&(picked, _)| picked == id)
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn kind(&self) -> Option<TileKind> {
        self.picks.first().map(|&(_, kind)| kind)
    }

    pub fn clear(&mut self) {
        self.picks.clear();
    }

    /// Handle a pick of tile `id`. The caller gates this on the board accepting input.
    pub fn pick(&mut self, grid: &Grid, id: TileId) -> PickOutcome {
        let Some(tile) = grid.find(id) else {
            return PickOutcome::Ignored;
        };
        if let Some(index) = self.picks.iter().position(|&(picked, _)| picked == id) {
            self.picks.remove(index);
            return PickOutcome::Deselected;
        }
        let kind_changed = self.kind().is_some_and(|k| k != tile.kind);
        if kind_changed || self.picks.len() >= SELECTION_SIZE {
            self.picks.clear();
            self.picks.push((tile.id, tile.kind));
            return PickOutcome::Restarted;
        }
        self.picks.push((tile.id, tile.kind));
        if self.picks.len() < SELECTION_SIZE {
            return PickOutcome::Added(self.picks.len());
        }
        let live: Vec<Tile> = self.ids().filter_map(|id| grid.find(id).copied()).collect();
        if live.len() != SELECTION_SIZE {
            self.picks.retain(|&(id, _)| live.iter().any(|t| t.id == id));
            return PickOutcome::Revalidated(self.picks.len());
        }
        self.picks.clear();
        PickOutcome::Complete(MatchSet::from_tiles(live))
    }

    /// Drop ids that are no longer on the board (after a rise-step).
    pub fn prune(&mut self, grid: &Grid) -> usize {
        let before = self.picks.len();
        self.picks.retain(|&(id, _)| grid.find(id).is_some());
        before - self.picks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileIds;

    fn board() -> Grid {
        let mut ids = TileIds::new();
        Grid::from_pattern(&["A.B.A", "B.A.C", "CCBAB"], &mut ids)
    }

    fn id_at(grid: &Grid, row: usize, col: usize) -> TileId {
        grid.get(row, col).unwrap().id
    }

    #[test]
    fn test_three_of_a_kind_completes_and_empties() {
        let grid = board();
        let mut sel = Selection::new();
        assert_eq!(sel.pick(&grid, id_at(&grid, 0, 0)), PickOutcome::Added(1));
        assert_eq!(sel.pick(&grid, id_at(&grid, 1, 2)), PickOutcome::Added(2));
        match sel.pick(&grid, id_at(&grid, 2, 3)) {
            PickOutcome::Complete(set) => {
                assert_eq!(set.len(), 3);
                assert!(set.iter().all(|t| t.kind == TileKind(0)));
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(sel.is_empty());
    }

    #[test]
    fn test_toggle_off() {
        let grid = board();
        let mut sel = Selection::new();
        let a = id_at(&grid, 0, 0);
        sel.pick(&grid, a);
        assert_eq!(sel.pick(&grid, a), PickOutcome::Deselected);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_kind_change_restarts() {
        let grid = board();
        let mut sel = Selection::new();
        sel.pick(&grid, id_at(&grid, 0, 0));
        sel.pick(&grid, id_at(&grid, 0, 4));
        let b = id_at(&grid, 0, 2);
        assert_eq!(sel.pick(&grid, b), PickOutcome::Restarted);
        assert_eq!(sel.ids().collect::<Vec<_>>(), vec![b]);
        assert_eq!(sel.kind(), Some(TileKind(1)));
    }

    #[test]
    fn test_unknown_tile_is_ignored() {
        let grid = board();
        let mut sel = Selection::new();
        assert_eq!(sel.pick(&grid, TileId(9_999)), PickOutcome::Ignored);
        let pending = grid.pending_row()[0].id;
        assert_eq!(sel.pick(&grid, pending), PickOutcome::Ignored);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_stale_member_aborts_completion() {
        let mut grid = board();
        let mut sel = Selection::new();
        sel.pick(&grid, id_at(&grid, 0, 0));
        sel.pick(&grid, id_at(&grid, 1, 2));
        let third = id_at(&grid, 2, 3);
        // The first pick vanishes without a prune in between.
        grid.take(0, 0);
        assert_eq!(sel.pick(&grid, third), PickOutcome::Revalidated(2));
        assert_eq!(sel.len(), 2);
        assert!(sel.contains(third));
    }

    #[test]
    fn test_prune_drops_missing_ids() {
        let mut grid = board();
        let mut sel = Selection::new();
        sel.pick(&grid, id_at(&grid, 0, 0));
        sel.pick(&grid, id_at(&grid, 0, 4));
        grid.take(0, 4);
        assert_eq!(sel.prune(&grid), 1);
        assert_eq!(sel.len(), 1);
    }
}
