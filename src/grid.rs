//! Grid store: tiles, cells, the pending spawn row, gravity and the constrained initial fill.

use crate::rules::BoardConfig;
use rand::Rng;

/// Stable tile identity; survives moves, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

/// Symbolic tile kind, `0..kinds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKind(pub u8);

/// A tile and the slot it believes it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub id: TileId,
    pub kind: TileKind,
    pub col: usize,
    pub row: usize,
}

/// Monotonic id source. Restarting a session starts a new counter.
#[derive(Debug, Clone, Default)]
pub struct TileIds {
    next: u64,
}

impl TileIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make(&mut self, kind: TileKind, col: usize, row: usize) -> Tile {
        let id = TileId(self.next);
        self.next += 1;
        Tile { id, kind, col, row }
    }
}

/// Board cells plus the pending row. `cells[row][col]`, row 0 is top.
#[derive(Debug, Clone)]
pub struct Grid {
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Option<Tile>>>,
    /// Next bottom row; its tiles carry `row == rows` (one below the board).
    pending: Vec<Tile>,
}

impl Grid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: (0..rows).map(|_| vec![None; cols]).collect(),
            pending: Vec::with_capacity(cols),
        }
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&Tile> {
        self.cells.get(row).and_then(|r| r.get(col)).and_then(Option::as_ref)
    }

    /// Clear a cell, returning what was there.
    pub fn take(&mut self, row: usize, col: usize) -> Option<Tile> {
        self.cells.get_mut(row).and_then(|r| r.get_mut(col)).and_then(Option::take)
    }

    /// Write `tile` into (row, col), rewriting its own coordinates. Returns the displaced tile.
    /// Out-of-range writes are dropped.
    pub fn place(&mut self, mut tile: Tile, row: usize, col: usize) -> Option<Tile> {
        let slot = self.cells.get_mut(row).and_then(|r| r.get_mut(col))?;
        tile.row = row;
        tile.col = col;
        slot.replace(tile)
    }

    /// Move the tile at `from` to the empty cell `to`. False if `from` is empty or `to` is taken.
    pub fn relocate(&mut self, from: (usize, usize), to: (usize, usize)) -> bool {
        if from == to {
            return self.get(from.0, from.1).is_some();
        }
        if self.get(to.0, to.1).is_some() || to.0 >= self.rows || to.1 >= self.cols {
            return false;
        }
        match self.take(from.0, from.1) {
            Some(tile) => {
                self.place(tile, to.0, to.1);
                true
            }
            None => false,
        }
    }

    /// Occupied cells in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.cells.iter().flatten().flatten()
    }

    pub fn tile_count(&self) -> usize {
        self.occupied().count()
    }

    pub fn find(&self, id: TileId) -> Option<&Tile> {
        self.occupied().find(|t| t.id == id)
    }

    /// True if the cell the tile claims still holds that same tile.
    #[inline]
    pub fn is_live(&self, tile: &Tile) -> bool {
        self.get(tile.row, tile.col).is_some_and(|t| t.id == tile.id)
    }

    pub fn pending_row(&self) -> &[Tile] {
        &self.pending
    }

    /// Replace the pending row; tiles are positioned one row below the board.
    pub fn set_pending(&mut self, row: Vec<Tile>) {
        debug_assert_eq!(row.len(), self.cols, "pending row must span the board");
        let below = self.rows;
        self.pending = row
            .into_iter()
            .enumerate()
            .map(|(col, tile)| Tile { col, row: below, ..tile })
            .collect();
    }

    /// Structural part of a rise-step: drop the top row, move every other row up by one,
    /// install the current pending row at the bottom and `next_pending` as the new pending row.
    /// Returns the tiles that left the board.
    pub fn shift_up(&mut self, next_pending: Vec<Tile>) -> Vec<Tile> {
        if self.rows == 0 {
            return Vec::new();
        }
        let removed: Vec<Tile> = self.cells.remove(0).into_iter().flatten().collect();
        for (row, cells) in self.cells.iter_mut().enumerate() {
            for tile in cells.iter_mut().flatten() {
                tile.row = row;
            }
        }
        let bottom = self.rows - 1;
        let mut new_row = vec![None; self.cols];
        for tile in std::mem::take(&mut self.pending) {
            if let Some(slot) = new_row.get_mut(tile.col) {
                *slot = Some(Tile { row: bottom, ..tile });
            }
        }
        self.cells.push(new_row);
        self.set_pending(next_pending);
        removed
    }

    /// Gravity: per column, compact tiles downward keeping their vertical order.
    /// Returns how many tiles moved.
    pub fn compact_columns(&mut self) -> usize {
        let mut moved = 0;
        for col in 0..self.cols {
            let mut write = self.rows;
            for row in (0..self.rows).rev() {
                if self.get(row, col).is_none() {
                    continue;
                }
                write -= 1;
                if write != row {
                    self.relocate((row, col), (write, col));
                    moved += 1;
                }
            }
        }
        moved
    }

    /// Every occupied cell holds a tile whose coordinates match its slot, and ids are unique.
    pub fn check_consistency(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if let Some(tile) = cell {
                    if tile.row != row || tile.col != col || !seen.insert(tile.id) {
                        return false;
                    }
                }
            }
        }
        self.pending
            .iter()
            .enumerate()
            .all(|(col, t)| t.col == col && t.row == self.rows && seen.insert(t.id))
    }
}

/// Kinds that can go at (row, col) without completing a run of three with the two cells to
/// the left or the two cells above. Pure; looks only at the grid snapshot.
pub fn allowed_kinds(grid: &Grid, row: usize, col: usize, kinds: u8) -> Vec<TileKind> {
    let kind_at = |r: usize, c: usize| grid.get(r, c).map(|t| t.kind);
    let left = (col >= 2).then(|| (kind_at(row, col - 1), kind_at(row, col - 2)));
    let up = (row >= 2).then(|| (kind_at(row - 1, col), kind_at(row - 2, col)));
    let completes = |pair: Option<(Option<TileKind>, Option<TileKind>)>, kind: TileKind| {
        matches!(pair, Some((Some(a), Some(b))) if a == kind && b == kind)
    };
    (0..kinds)
        .map(TileKind)
        .filter(|&k| !completes(left, k) && !completes(up, k))
        .collect()
}

/// A fresh pending row: kinds are uniformly random, runs are allowed.
pub fn random_row<R: Rng>(
    cols: usize,
    rows: usize,
    ids: &mut TileIds,
    rng: &mut R,
    kinds: u8,
) -> Vec<Tile> {
    (0..cols)
        .map(|col| ids.make(TileKind(rng.random_range(0..kinds)), col, rows))
        .collect()
}

/// A new board: empty top rows, constrained fill below, and a pending row.
pub fn fill_initial<R: Rng>(config: &BoardConfig, ids: &mut TileIds, rng: &mut R) -> Grid {
    let mut grid = Grid::new(config.cols, config.rows);
    for row in config.start_empty_rows.min(config.rows)..config.rows {
        for col in 0..config.cols {
            let options = allowed_kinds(&grid, row, col, config.kinds);
            // At most two kinds are excluded and there are always at least four.
            let kind = options[rng.random_range(0..options.len())];
            let tile = ids.make(kind, col, row);
            grid.place(tile, row, col);
        }
    }
    let pending = random_row(config.cols, config.rows, ids, rng, config.kinds);
    grid.set_pending(pending);
    grid
}

#[cfg(test)]
impl Grid {
    /// Build a grid from one string per row: `.` is empty, `A`.. are kinds 0...
    pub(crate) fn from_pattern(pattern: &[&str], ids: &mut TileIds) -> Self {
        let rows = pattern.len();
        let cols = pattern.first().map_or(0, |r| r.chars().count());
        let mut grid = Self::new(cols, rows);
        for (row, line) in pattern.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                if ch.is_ascii_uppercase() {
                    let tile = ids.make(TileKind(ch as u8 - b'A'), col, row);
                    grid.place(tile, row, col);
                }
            }
        }
        let pending = (0..cols).map(|col| ids.make(TileKind(0), col, rows)).collect();
        grid.set_pending(pending);
        grid
    }

    /// Inverse of `from_pattern`, for readable assertions.
    pub(crate) fn to_pattern(&self) -> Vec<String> {
        (0..self.rows)
            .map(|row| {
                (0..self.cols)
                    .map(|col| self.get(row, col).map_or('.', |t| (b'A' + t.kind.0) as char))
                    .collect()
            })
            .collect()
    }
}
