//! Rise scheduler: start delay, speed curve, sub-tile offset, discrete rise-steps, danger line.

use crate::grid::{Grid, Tile, TileIds, random_row};
use crate::rules::BoardConfig;
use rand::Rng;

/// What drives the rise speed up over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedMode {
    /// Progress is seconds survived after the start delay.
    #[default]
    Time,
    /// Progress is `score / 25`.
    Score,
}

impl SpeedMode {
    /// Parse a configuration value. Anything unrecognised falls back to `Time`.
    pub fn from_label(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "time" => Self::Time,
            "score" => Self::Score,
            other => {
                log::warn!("unknown speed mode {other:?}, using time");
                Self::Time
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Score => "score",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Time => "Time Mode",
            Self::Score => "Score Mode",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Time => Self::Score,
            Self::Score => Self::Time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiseScheduler {
    mode: SpeedMode,
    base: f64,
    accel: f64,
    max: f64,
    tile_size: f64,
    score_divisor: f64,
    delay_left: f64,
    survived: f64,
    offset: f64,
}

impl RiseScheduler {
    pub fn new(mode: SpeedMode, config: &BoardConfig) -> Self {
        Self {
            mode,
            base: config.rise_speed_start,
            accel: config.rise_speed_accel,
            max: config.rise_speed_max,
            tile_size: config.tile_size,
            score_divisor: config.score_progress_divisor,
            delay_left: config.rise_start_delay,
            survived: 0.0,
            offset: 0.0,
        }
    }

    #[inline]
    pub fn mode(&self) -> SpeedMode {
        self.mode
    }

    /// Progress toward the maximum speed for the current mode.
    pub fn progress(&self, score: u32) -> f64 {
        match self.mode {
            SpeedMode::Time => self.survived,
            SpeedMode::Score => score as f64 / self.score_divisor,
        }
    }

    /// Board units per second.
    pub fn speed(&self, score: u32) -> f64 {
        (self.base + self.progress(score) * self.accel).min(self.max)
    }

    #[inline]
    pub fn started(&self) -> bool {
        self.delay_left <= 0.0
    }

    pub fn delay_left(&self) -> f64 {
        self.delay_left.max(0.0)
    }

    /// Sub-tile progress toward the next rise-step, in `[0, tile_size)`.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Advance one IDLE tick. While the start delay runs the tick only counts it down and
    /// returns `None`. Afterwards the offset accrues and the number of whole rise-steps due is
    /// returned (possibly zero, possibly several at high speed).
    pub fn advance(&mut self, dt: f64, score: u32) -> Option<usize> {
        if !self.started() {
            self.delay_left -= dt;
            return None;
        }
        if self.mode == SpeedMode::Time {
            self.survived += dt;
        }
        self.offset += self.speed(score) * dt;
        let whole = (self.offset / self.tile_size).floor();
        self.offset = (self.offset - whole * self.tile_size).clamp(0.0, self.tile_size.next_down());
        Some(whole as usize)
    }
}

/// One discrete rise-step: the top row leaves, everything moves up a row, the pending row
/// becomes the bottom row and a fresh unconstrained pending row is generated.
pub fn rise_step<R: Rng>(grid: &mut Grid, ids: &mut TileIds, rng: &mut R, kinds: u8) -> Vec<Tile> {
    let next = random_row(grid.cols(), grid.rows(), ids, rng, kinds);
    let removed = grid.shift_up(next);
    debug_assert!(grid.check_consistency());
    removed
}

/// First occupied tile whose top edge is at or above the danger line, if any.
pub fn danger_breach(grid: &Grid, rising_offset: f64, config: &BoardConfig) -> Option<Tile> {
    grid.occupied()
        .find(|t| config.tile_top_y(t.row, rising_offset) <= config.danger_line_y)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{TileId, fill_initial};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_unknown_mode_falls_back_to_time() {
        assert_eq!(SpeedMode::from_label("score"), SpeedMode::Score);
        assert_eq!(SpeedMode::from_label(" Score "), SpeedMode::Score);
        assert_eq!(SpeedMode::from_label("time"), SpeedMode::Time);
        assert_eq!(SpeedMode::from_label("warp"), SpeedMode::Time);
        assert_eq!(SpeedMode::from_label(""), SpeedMode::Time);
    }

    #[test]
    fn test_score_mode_speed_curve() {
        let config = BoardConfig::default();
        let rise = RiseScheduler::new(SpeedMode::Score, &config);
        assert!((rise.speed(0) - 3.2).abs() < 1e-9);
        assert!((rise.speed(250) - 5.2).abs() < 1e-9);
        assert!((rise.speed(1_000_000) - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_mode_is_frozen_during_start_delay() {
        let config = BoardConfig::default();
        let mut rise = RiseScheduler::new(SpeedMode::Time, &config);
        for _ in 0..39 {
            assert_eq!(rise.advance(0.1, 0), None);
        }
        assert!((rise.speed(0) - 3.2).abs() < 1e-9);
        assert_eq!(rise.offset(), 0.0);
        assert_eq!(rise.advance(0.2, 0), None, "the tick that ends the delay only counts it down");
        assert!(rise.started());
        assert_eq!(rise.advance(1.0, 0), Some(0));
        assert!((rise.progress(0) - 1.0).abs() < 1e-9);
        // Survived time is counted before the speed for this tick is taken.
        assert!((rise.offset() - 3.4).abs() < 1e-9);
    }

    #[test]
    fn test_high_speed_fires_several_steps_and_keeps_offset_in_range() {
        let config = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let mut rise = RiseScheduler::new(SpeedMode::Score, &config);
        // 14 units/s at max speed over 10 s = 140 units = 2 tiles + 16.
        let steps = rise.advance(10.0, 1_000_000);
        assert_eq!(steps, Some(2));
        assert!((rise.offset() - 16.0).abs() < 1e-9);
        assert!(rise.offset() >= 0.0 && rise.offset() < config.tile_size);
    }

    #[test]
    fn test_long_tick_counts_steps_without_leaving_range() {
        let config = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let mut rise = RiseScheduler::new(SpeedMode::Time, &config);
        // Survived time saturates the speed at 14 units/s: 14e6 units = 225806 tiles + 28.
        assert_eq!(rise.advance(1e6, 0), Some(225_806));
        assert!((rise.offset() - 28.0).abs() < 1e-3);
    }

    #[test]
    fn test_pending_tile_climbs_one_row_per_step() {
        let config = BoardConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ids = TileIds::new();
        let mut grid = fill_initial(&config, &mut ids, &mut rng);
        let tracked: TileId = grid.pending_row()[2].id;
        for k in 1..=config.rows {
            rise_step(&mut grid, &mut ids, &mut rng, config.kinds);
            let tile = grid.find(tracked).expect("still on the board");
            assert_eq!(tile.row, (config.rows - 1) - (k - 1));
            assert_eq!(tile.col, 2);
        }
        rise_step(&mut grid, &mut ids, &mut rng, config.kinds);
        assert!(grid.find(tracked).is_none(), "rose off the top");
    }

    #[test]
    fn test_danger_line() {
        let config = BoardConfig::default();
        let mut ids = TileIds::new();
        let pattern = [".......", "..A....", "BBBBBBB"];
        let grid = Grid::from_pattern(&pattern, &mut ids);
        assert!(danger_breach(&grid, 0.0, &config).is_none());
        assert!(danger_breach(&grid, 57.9, &config).is_none());
        let hit = danger_breach(&grid, 58.0, &config).expect("row 1 reaches the line");
        assert_eq!((hit.row, hit.col), (1, 2));
    }
}
