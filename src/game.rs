//! Game session: owns the board, selection, score, timers and the pending cascade step.
//!
//! One `Session` is one run of the game. The presentation layer drives it with `tick(dt)`,
//! `click(id)`, `toggle_pause()` and `restart()`, and reads snapshots back between ticks.

use crate::cascade::{CascadeCtx, CascadeResolver};
use crate::grid::{Grid, Tile, TileId, TileIds, fill_initial};
use crate::highscores::HighScoreStore;
use crate::rise::{RiseScheduler, SpeedMode, danger_breach, rise_step};
use crate::rules::BoardConfig;
use crate::selection::{PickOutcome, SELECTION_SIZE, Selection};
use crate::state::{BoardState, StateMachine};
use rand::rngs::StdRng;

/// Things that happened on the board since the last `drain_events`, for feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// Tiles cleared by one cascade round. `chain` is 1 for the player's own match.
    Popped {
        tiles: Vec<Tile>,
        centroid: (f64, f64),
        gained: u32,
        chain: usize,
    },
    /// A completed match found every tile stale and did nothing.
    Fizzled,
    RiseStep {
        removed: usize,
    },
    GameOver {
        score: u32,
        new_record: bool,
    },
}

pub struct Session<S: HighScoreStore> {
    config: BoardConfig,
    grid: Grid,
    ids: TileIds,
    rng: StdRng,
    selection: Selection,
    machine: StateMachine,
    rise: RiseScheduler,
    cascade: CascadeResolver,
    score: u32,
    high_score: u32,
    /// High score when this run started; decides whether game over is a new record.
    best_at_start: u32,
    store: S,
    /// Board time in seconds; only advances while the game is live.
    clock: f64,
    events: Vec<BoardEvent>,
    status: String,
}

impl<S: HighScoreStore> Session<S> {
    /// New run. Reads the high score from `store` once.
    pub fn new(config: BoardConfig, mode: SpeedMode, mut store: S, mut rng: StdRng) -> Self {
        let kinds = config.kinds;
        let config = config.with_kinds(kinds);
        let high_score = store.load();
        let mut ids = TileIds::new();
        let grid = fill_initial(&config, &mut ids, &mut rng);
        log::debug!(
            "new session: {}x{} board, {} tiles, {} kinds, {} mode, best {}",
            config.cols,
            config.rows,
            grid.tile_count(),
            config.kinds,
            mode.name(),
            high_score
        );
        let mut session = Self {
            rise: RiseScheduler::new(mode, &config),
            config,
            grid,
            ids,
            rng,
            selection: Selection::new(),
            machine: StateMachine::new(),
            cascade: CascadeResolver::new(),
            score: 0,
            high_score,
            best_at_start: high_score,
            store,
            clock: 0.0,
            events: Vec::new(),
            status: String::new(),
        };
        session.refresh_status();
        session
    }

    /// Throw away the current run (including any in-flight cascade) and start a fresh one
    /// with the same mode. The high score carries over.
    pub fn restart(&mut self) {
        self.restart_with(self.rise.mode());
    }

    /// Like `restart`, switching the speed mode.
    pub fn restart_with(&mut self, mode: SpeedMode) {
        log::debug!(
            "restart at score {} ({}), {} mode",
            self.score,
            self.machine.state().label(),
            mode.name()
        );
        self.cascade.cancel();
        self.ids = TileIds::new();
        self.grid = fill_initial(&self.config, &mut self.ids, &mut self.rng);
        self.selection.clear();
        self.machine.reset();
        self.rise = RiseScheduler::new(mode, &self.config);
        self.score = 0;
        self.best_at_start = self.high_score;
        self.clock = 0.0;
        self.events.clear();
        self.refresh_status();
    }

    /// Advance the board by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        if self.machine.state().runs_clock() {
            // A tick that started mid-cascade does not rise, even if the cascade ends in it.
            let was_idle = self.machine.state().rises();
            self.clock += dt;
            let now = self.clock;
            let (cascade, mut ctx) = self.cascade_parts();
            cascade.service(&mut ctx, now);
            if was_idle && self.machine.state().rises() {
                self.advance_rise(dt);
            }
            self.record_high_score();
        }
        self.refresh_status();
    }

    /// Player picked tile `id`. Ignored unless the board is IDLE.
    pub fn click(&mut self, id: TileId) -> PickOutcome {
        if !self.machine.state().accepts_input() {
            return PickOutcome::Ignored;
        }
        let outcome = self.selection.pick(&self.grid, id);
        if let PickOutcome::Complete(matches) = &outcome {
            let now = self.clock;
            let (cascade, mut ctx) = self.cascade_parts();
            cascade.resolve(&mut ctx, matches, now);
            self.record_high_score();
        }
        self.refresh_status();
        outcome
    }

    /// IDLE <-> PAUSED. Pausing drops the selection.
    pub fn toggle_pause(&mut self) -> bool {
        let toggled = self.machine.toggle_pause();
        if toggled && self.machine.state() == BoardState::Paused {
            self.selection.clear();
        }
        self.refresh_status();
        toggled
    }

    fn cascade_parts(&mut self) -> (&mut CascadeResolver, CascadeCtx<'_>) {
        let ctx = CascadeCtx {
            grid: &mut self.grid,
            machine: &mut self.machine,
            score: &mut self.score,
            events: &mut self.events,
            config: &self.config,
            rising_offset: self.rise.offset(),
        };
        (&mut self.cascade, ctx)
    }

    fn advance_rise(&mut self, dt: f64) {
        let Some(steps) = self.rise.advance(dt, self.score) else {
            return;
        };
        for _ in 0..steps {
            let removed = rise_step(&mut self.grid, &mut self.ids, &mut self.rng, self.config.kinds);
            let pruned = self.selection.prune(&self.grid);
            log::trace!("rise-step: {} tiles off the top, {} picks pruned", removed.len(), pruned);
            self.events.push(BoardEvent::RiseStep {
                removed: removed.len(),
            });
            if let Some(tile) = danger_breach(&self.grid, self.rise.offset(), &self.config) {
                self.game_over(&tile);
                return;
            }
        }
        if let Some(tile) = danger_breach(&self.grid, self.rise.offset(), &self.config) {
            self.game_over(&tile);
        }
    }

    fn game_over(&mut self, breach: &Tile) {
        if !self.machine.transition(BoardState::GameOver) {
            return;
        }
        self.selection.clear();
        self.record_high_score();
        let new_record = self.score > self.best_at_start;
        log::info!(
            "game over: tile at ({}, {}) crossed the danger line, score {}{}",
            breach.col,
            breach.row,
            self.score,
            if new_record { " (new record)" } else { "" }
        );
        self.events.push(BoardEvent::GameOver {
            score: self.score,
            new_record,
        });
    }

    fn record_high_score(&mut self) {
        if self.score <= self.high_score {
            return;
        }
        self.high_score = self.score;
        if let Err(e) = self.store.save(self.score) {
            log::warn!("could not save high score: {e}");
        }
    }

    fn refresh_status(&mut self) {
        self.status = match self.machine.state() {
            BoardState::GameOver => "Press R to play again".to_string(),
            _ if !self.selection.is_empty() => {
                format!("{}/{} selected", self.selection.len(), SELECTION_SIZE)
            }
            _ => format!("Pick any 3 matching tiles ({})", self.rise.mode().label()),
        };
    }

    pub fn drain_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Occupied cells: kind and (col, row). Combine with `rising_offset` to place them.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.grid.occupied()
    }

    pub fn tile_at(&self, row: usize, col: usize) -> Option<&Tile> {
        self.grid.get(row, col)
    }

    pub fn pending_row(&self) -> &[Tile] {
        self.grid.pending_row()
    }

    pub fn rising_offset(&self) -> f64 {
        self.rise.offset()
    }

    /// Selected ids in pick order.
    pub fn selection(&self) -> Vec<TileId> {
        self.selection.ids().collect()
    }

    pub fn is_selected(&self, id: TileId) -> bool {
        self.selection.contains(id)
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn state(&self) -> BoardState {
        self.machine.state()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn mode(&self) -> SpeedMode {
        self.rise.mode()
    }

    pub fn rise_speed(&self) -> f64 {
        self.rise.speed(self.score)
    }

    pub fn start_delay_left(&self) -> f64 {
        self.rise.delay_left()
    }
}

#[cfg(test)]
impl<S: HighScoreStore> Session<S> {
    pub(crate) fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
impl Session<crate::highscores::MemoryStore> {
    /// Session over a hand-built board (see `Grid::from_pattern`).
    pub(crate) fn from_pattern(
        pattern: &[&str],
        mode: SpeedMode,
        base: BoardConfig,
        store: crate::highscores::MemoryStore,
    ) -> Self {
        use rand::SeedableRng;
        let mut ids = TileIds::new();
        let grid = Grid::from_pattern(pattern, &mut ids);
        let config = BoardConfig {
            cols: grid.cols(),
            rows: grid.rows(),
            ..base
        };
        let mut session = Self::new(config, mode, store, StdRng::seed_from_u64(7));
        session.grid = grid;
        session.ids = ids;
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highscores::MemoryStore;
    use rand::SeedableRng;

    const BOARD: [&str; 6] = [
        ".......",
        ".......",
        ".......",
        "B......",
        "B......",
        "ACADAEA",
    ];

    fn session(pattern: &[&str]) -> Session<MemoryStore> {
        Session::from_pattern(pattern, SpeedMode::Time, BoardConfig::default(), MemoryStore::default())
    }

    fn id(s: &Session<MemoryStore>, row: usize, col: usize) -> TileId {
        s.tile_at(row, col).unwrap().id
    }

    /// Tick in small steps until the board is quiet again, recording state changes.
    fn run_until_idle(s: &mut Session<MemoryStore>) -> Vec<BoardState> {
        let mut seen = vec![s.state()];
        for _ in 0..1_000 {
            s.tick(0.016);
            if seen.last() != Some(&s.state()) {
                seen.push(s.state());
            }
            if s.state() == BoardState::Idle {
                break;
            }
        }
        seen
    }

    #[test]
    fn test_new_session_is_idle_and_reads_high_score() {
        let s = Session::new(
            BoardConfig::default(),
            SpeedMode::Score,
            MemoryStore::with_value(120),
            StdRng::seed_from_u64(1),
        );
        assert_eq!(s.state(), BoardState::Idle);
        assert_eq!(s.high_score(), 120);
        assert_eq!(s.score(), 0);
        assert!(s.selection().is_empty());
        assert!(s.grid().check_consistency());
        assert!((s.rise_speed() - 3.2).abs() < 1e-9);
        assert_eq!(s.status(), "Pick any 3 matching tiles (Score Mode)");
    }

    #[test]
    fn test_triple_runs_state_cycle_and_empties_selection() {
        let mut s = session(&BOARD);
        s.click(id(&s, 5, 0));
        s.click(id(&s, 5, 2));
        assert_eq!(s.status(), "2/3 selected");
        let outcome = s.click(id(&s, 5, 6));
        assert!(matches!(outcome, PickOutcome::Complete(_)));
        assert_eq!(s.state(), BoardState::Matching);
        assert!(s.selection().is_empty());

        let mut states = vec![BoardState::Idle];
        states.extend(run_until_idle(&mut s));
        assert_eq!(states.first(), Some(&BoardState::Idle));
        assert_eq!(states.last(), Some(&BoardState::Idle));
        // IDLE -> MATCHING -> (DROPPING -> MATCHING)* -> ... -> IDLE
        for pair in states.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", states);
        }
        assert!(states.contains(&BoardState::Dropping));
        assert!(s.selection().is_empty());
        assert!(s.grid().check_consistency());
    }

    #[test]
    fn test_score_matches_popped_tiles() {
        let mut s = session(&BOARD);
        s.click(id(&s, 5, 0));
        s.click(id(&s, 5, 2));
        s.click(id(&s, 5, 4));
        run_until_idle(&mut s);
        let popped: usize = s
            .drain_events()
            .iter()
            .map(|e| match e {
                BoardEvent::Popped { tiles, .. } => tiles.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(popped, 3);
        assert_eq!(s.score(), 30);
    }

    #[test]
    fn test_input_ignored_while_cascading() {
        let mut s = session(&BOARD);
        let c = id(&s, 5, 1);
        s.click(id(&s, 5, 0));
        s.click(id(&s, 5, 2));
        s.click(id(&s, 5, 4));
        assert_eq!(s.click(c), PickOutcome::Ignored);
        assert!(s.selection().is_empty());
        assert!(!s.toggle_pause(), "cannot pause mid-cascade");
    }

    #[test]
    fn test_settle_time_does_not_count_toward_rising() {
        let base = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let mut s = Session::from_pattern(&BOARD, SpeedMode::Time, base, MemoryStore::default());
        // Nothing stands above these three, so the cascade ends right after the settle.
        s.click(id(&s, 5, 2));
        s.click(id(&s, 5, 4));
        s.click(id(&s, 5, 6));
        assert_eq!(s.state(), BoardState::Matching);
        s.tick(s.config().settle_seconds);
        assert_eq!(s.state(), BoardState::Idle);
        assert_eq!(s.rising_offset(), 0.0);
        assert!((s.rise_speed() - 3.2).abs() < 1e-9, "no survived time accrued");
        s.tick(0.5);
        assert!(s.rising_offset() > 0.0);
    }

    #[test]
    fn test_too_few_kinds_are_raised_to_the_minimum() {
        let config = BoardConfig { kinds: 0, ..BoardConfig::default() };
        let s = Session::new(config, SpeedMode::Time, MemoryStore::default(), StdRng::seed_from_u64(4));
        assert_eq!(s.config().kinds, crate::rules::MIN_TILE_KINDS);
        assert_eq!(s.tiles().count(), 7 * 6);
        assert!(crate::matcher::check_matches(s.grid()).is_empty());
    }

    #[test]
    fn test_huge_tick_stops_rising_at_game_over() {
        let base = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let mut s = Session::new(base, SpeedMode::Time, MemoryStore::default(), StdRng::seed_from_u64(5));
        s.tick(1e6);
        assert_eq!(s.state(), BoardState::GameOver);
        let steps = s
            .drain_events()
            .iter()
            .filter(|e| matches!(e, BoardEvent::RiseStep { .. }))
            .count();
        assert!((1..=s.config().rows).contains(&steps), "{steps} rise-steps");
        assert!(s.grid().check_consistency());
    }

    #[test]
    fn test_pause_suspends_rising_and_drops_selection() {
        let base = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let mut s = Session::from_pattern(&BOARD, SpeedMode::Time, base, MemoryStore::default());
        s.click(id(&s, 5, 0));
        assert!(s.toggle_pause());
        assert_eq!(s.state(), BoardState::Paused);
        assert!(s.selection().is_empty());
        s.tick(5.0);
        assert_eq!(s.rising_offset(), 0.0);
        assert!(s.toggle_pause());
        s.tick(1.0);
        assert!(s.rising_offset() > 0.0);
    }

    #[test]
    fn test_rise_steps_carry_pending_tile_up() {
        let empty = [".......", ".......", ".......", ".......", ".......", ".......", ".......", ".......", ".......", "......."];
        let base = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let mut s = Session::from_pattern(&empty, SpeedMode::Score, base, MemoryStore::default());
        let tracked = s.pending_row()[3].id;
        let rows = s.config().rows;
        // 20 s at 3.2 units/s is 64 units: exactly one step per tick while the offset stays small.
        for k in 1..rows {
            s.tick(20.0);
            let tile = s.grid().find(tracked).expect("on the board");
            assert_eq!(tile.row, (rows - 1) - (k - 1));
            assert_eq!(s.state(), BoardState::Idle);
        }
        s.tick(20.0);
        assert_eq!(s.grid().find(tracked).map(|t| t.row), Some(0));
        assert_eq!(s.state(), BoardState::GameOver);
    }

    #[test]
    fn test_game_over_fires_once_for_many_breaches() {
        let base = BoardConfig { rise_start_delay: 0.0, ..BoardConfig::default() };
        let full_top = ["ABCDEFG", "BCDEFGA", "CDEFGAB"];
        let mut s = Session::from_pattern(&full_top, SpeedMode::Time, base, MemoryStore::default());
        s.tick(0.016);
        s.tick(0.016);
        let overs = s
            .drain_events()
            .iter()
            .filter(|e| matches!(e, BoardEvent::GameOver { .. }))
            .count();
        assert_eq!(overs, 1);
        assert_eq!(s.state(), BoardState::GameOver);
        assert_eq!(s.status(), "Press R to play again");
        let any = id(&s, 1, 1);
        assert_eq!(s.click(any), PickOutcome::Ignored);
    }

    #[test]
    fn test_high_score_written_when_exceeded() {
        let mut s = Session::from_pattern(&BOARD, SpeedMode::Time, BoardConfig::default(), MemoryStore::with_value(20));
        assert_eq!(s.high_score(), 20);
        s.click(id(&s, 5, 0));
        s.click(id(&s, 5, 2));
        s.click(id(&s, 5, 4));
        assert_eq!(s.high_score(), 30);
        assert_eq!(s.store().writes, vec![30]);
        run_until_idle(&mut s);
        assert_eq!(s.store().writes, vec![30], "no rewrite without a new record");
    }

    #[test]
    fn test_restart_cancels_cascade_and_reinitialises() {
        let mut s = Session::new(
            BoardConfig::default(),
            SpeedMode::Time,
            MemoryStore::default(),
            StdRng::seed_from_u64(11),
        );
        // Pick three tiles of the most common kind on the board.
        let mut by_kind: std::collections::HashMap<u8, Vec<TileId>> = Default::default();
        for t in s.tiles() {
            by_kind.entry(t.kind.0).or_default().push(t.id);
        }
        let ids = by_kind.values().find(|v| v.len() >= 3).expect("42 tiles over 12 kinds").clone();
        for id in &ids[..3] {
            s.click(*id);
        }
        assert_eq!(s.state(), BoardState::Matching);
        s.restart();
        assert_eq!(s.state(), BoardState::Idle);
        assert_eq!(s.score(), 0);
        assert_eq!(s.high_score(), 30);
        assert!(s.selection().is_empty());
        assert_eq!(s.rising_offset(), 0.0);
        assert!((s.start_delay_left() - s.config().rise_start_delay).abs() < 1e-9);
        assert_eq!(s.tiles().count(), 7 * 6);
        assert!(crate::matcher::check_matches(s.grid()).is_empty());
        s.tick(1.0);
        assert_eq!(s.state(), BoardState::Idle, "cancelled cascade never resumes");
    }
}
