//! Match detection: runs of three or more identical kinds along rows and columns.

use crate::grid::{Grid, Tile, TileId};
use std::collections::BTreeMap;

/// Minimum run length that pops.
pub const MIN_RUN: usize = 3;

/// A set of tiles to pop, ordered by (row, col) and counted once each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    tiles: BTreeMap<(usize, usize), Tile>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of specific tiles (e.g. a completed selection). Later duplicates of a slot win.
    pub fn from_tiles(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut set = Self::new();
        for tile in tiles {
            set.insert(tile);
        }
        set
    }

    pub fn insert(&mut self, tile: Tile) {
        self.tiles.insert((tile.row, tile.col), tile);
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.values()
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.tiles.values().any(|t| t.id == id)
    }
}

/// Collects maximal same-kind runs from a sequence of cells.
struct RunScanner<'a> {
    run: Vec<&'a Tile>,
}

impl<'a> RunScanner<'a> {
    fn new() -> Self {
        Self { run: Vec::new() }
    }

    fn push(&mut self, cell: Option<&'a Tile>, out: &mut MatchSet) {
        match cell {
            Some(tile) if self.run.last().is_some_and(|last| last.kind == tile.kind) => {
                self.run.push(tile);
            }
            Some(tile) => {
                self.flush(out);
                self.run.push(tile);
            }
            None => self.flush(out),
        }
    }

    fn flush(&mut self, out: &mut MatchSet) {
        if self.run.len() >= MIN_RUN {
            for tile in &self.run {
                out.insert(**tile);
            }
        }
        self.run.clear();
    }
}

/// Scan every row left-to-right and every column top-to-bottom; union all runs of 3+.
pub fn check_matches(grid: &Grid) -> MatchSet {
    let mut matches = MatchSet::new();
    for row in 0..grid.rows() {
        let mut scanner = RunScanner::new();
        for col in 0..grid.cols() {
            scanner.push(grid.get(row, col), &mut matches);
        }
        scanner.flush(&mut matches);
    }
    for col in 0..grid.cols() {
        let mut scanner = RunScanner::new();
        for row in 0..grid.rows() {
            scanner.push(grid.get(row, col), &mut matches);
        }
        scanner.flush(&mut matches);
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileIds;

    fn positions(set: &MatchSet) -> Vec<(usize, usize)> {
        set.iter().map(|t| (t.row, t.col)).collect()
    }

    #[test]
    fn test_single_horizontal_run() {
        let mut ids = TileIds::new();
        let grid = Grid::from_pattern(
            &["ABCDEFG", "BCDEFGA", "CDAAAGB", "DEFGABC"],
            &mut ids,
        );
        let matches = check_matches(&grid);
        assert_eq!(positions(&matches), vec![(2, 2), (2, 3), (2, 4)]);
        for t in matches.iter() {
            assert_eq!(grid.get(t.row, t.col).map(|g| g.id), Some(t.id));
        }
    }

    #[test]
    fn test_gap_breaks_run() {
        let mut ids = TileIds::new();
        let grid = Grid::from_pattern(&["AA.AA", "B.B.B", "....."], &mut ids);
        assert!(check_matches(&grid).is_empty());
    }

    #[test]
    fn test_vertical_run_and_long_run() {
        let mut ids = TileIds::new();
        let grid = Grid::from_pattern(&["A....", "A....", "A....", "BBBBB"], &mut ids);
        let matches = check_matches(&grid);
        assert_eq!(matches.len(), 8);
    }

    #[test]
    fn test_cross_counts_shared_tile_once() {
        let mut ids = TileIds::new();
        let grid = Grid::from_pattern(&[".A.", "AAA", ".A."], &mut ids);
        let matches = check_matches(&grid);
        assert_eq!(matches.len(), 5);
        let centre = grid.get(1, 1).unwrap().id;
        assert!(matches.contains(centre));
    }

    #[test]
    fn test_run_at_line_end_is_flushed() {
        let mut ids = TileIds::new();
        let grid = Grid::from_pattern(&["ABCC", "ABDC", "BADC"], &mut ids);
        let matches = check_matches(&grid);
        assert_eq!(positions(&matches), vec![(0, 3), (1, 3), (2, 3)]);
    }
}
