//! Board geometry and tuning: grid size, tile size, rise speeds, timings, scoring.

/// Columns on the board.
pub const GRID_COLS: usize = 7;
/// Rows on the board (row 0 is the top).
pub const GRID_ROWS: usize = 10;
/// Rows left empty at the top when a board is first filled.
pub const START_EMPTY_ROWS: usize = 4;
/// Number of distinct tile kinds.
pub const TILE_KINDS: u8 = 12;
/// Fewest kinds a board may use; the constrained fill excludes at most two.
pub const MIN_TILE_KINDS: u8 = 4;

/// Tile edge in board units.
pub const TILE_SIZE: f64 = 62.0;
pub const BOARD_PADDING: f64 = 16.0;
pub const UI_HEIGHT: f64 = 96.0;
pub const BOARD_X: f64 = BOARD_PADDING;
pub const BOARD_Y: f64 = UI_HEIGHT;
/// A tile whose top edge is at or above this line ends the game.
pub const DANGER_LINE_Y: f64 = BOARD_Y + 4.0;

/// Rise speed in board units per second.
pub const RISE_SPEED_START: f64 = 3.2;
pub const RISE_SPEED_ACCEL: f64 = 0.2;
pub const RISE_SPEED_MAX: f64 = 14.0;
/// Seconds before the board starts rising.
pub const RISE_START_DELAY_SECONDS: f64 = 4.0;

/// Pause between popping and gravity (clear delay plus a frame of slack).
pub const SETTLE_SECONDS: f64 = 0.100;
/// Pause after tiles fall before the board is rescanned.
pub const DROP_SECONDS: f64 = 0.140;

pub const SCORE_PER_TILE: u32 = 10;
/// In score mode, rise progress is `score / SCORE_PROGRESS_DIVISOR`.
pub const SCORE_PROGRESS_DIVISOR: f64 = 25.0;

/// Everything the engine needs to know about board shape and pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub cols: usize,
    pub rows: usize,
    pub kinds: u8,
    pub start_empty_rows: usize,
    pub tile_size: f64,
    pub board_x: f64,
    pub board_y: f64,
    pub danger_line_y: f64,
    pub rise_speed_start: f64,
    pub rise_speed_accel: f64,
    pub rise_speed_max: f64,
    pub rise_start_delay: f64,
    pub settle_seconds: f64,
    pub drop_seconds: f64,
    pub score_per_tile: u32,
    pub score_progress_divisor: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            cols: GRID_COLS,
            rows: GRID_ROWS,
            kinds: TILE_KINDS,
            start_empty_rows: START_EMPTY_ROWS,
            tile_size: TILE_SIZE,
            board_x: BOARD_X,
            board_y: BOARD_Y,
            danger_line_y: DANGER_LINE_Y,
            rise_speed_start: RISE_SPEED_START,
            rise_speed_accel: RISE_SPEED_ACCEL,
            rise_speed_max: RISE_SPEED_MAX,
            rise_start_delay: RISE_START_DELAY_SECONDS,
            settle_seconds: SETTLE_SECONDS,
            drop_seconds: DROP_SECONDS,
            score_per_tile: SCORE_PER_TILE,
            score_progress_divisor: SCORE_PROGRESS_DIVISOR,
        }
    }
}

impl BoardConfig {
    /// Same board with a different number of tile kinds (clamped to MIN_TILE_KINDS..=TILE_KINDS).
    pub fn with_kinds(mut self, kinds: u8) -> Self {
        self.kinds = kinds.clamp(MIN_TILE_KINDS, TILE_KINDS);
        self
    }

    /// Top edge of a tile in `row`, in board units, given the current rising offset.
    #[inline]
    pub fn tile_top_y(&self, row: usize, rising_offset: f64) -> f64 {
        self.board_y + row as f64 * self.tile_size - rising_offset
    }

    /// Centre of cell (col, row) in board units, given the current rising offset.
    #[inline]
    pub fn cell_center(&self, col: usize, row: usize, rising_offset: f64) -> (f64, f64) {
        (
            self.board_x + col as f64 * self.tile_size + self.tile_size / 2.0,
            self.tile_top_y(row, rising_offset) + self.tile_size / 2.0,
        )
    }

    /// Upper bound on pop rounds in one cascade: every round removes at least one tile.
    #[inline]
    pub fn cascade_round_limit(&self) -> usize {
        self.rows * self.cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_clamped() {
        assert_eq!(BoardConfig::default().with_kinds(1).kinds, MIN_TILE_KINDS);
        assert_eq!(BoardConfig::default().with_kinds(99).kinds, TILE_KINDS);
        assert_eq!(BoardConfig::default().with_kinds(6).kinds, 6);
    }

    #[test]
    fn test_row_zero_is_past_the_danger_line() {
        let config = BoardConfig::default();
        assert!(config.tile_top_y(0, 0.0) <= config.danger_line_y);
        assert!(config.tile_top_y(1, 0.0) > config.danger_line_y);
    }
}
