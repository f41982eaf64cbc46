//! Cascade resolution: pop -> settle -> gravity -> drop -> rescan, repeated until the board is quiet.
//!
//! The waits between phases are a single pending continuation with a deadline on the
//! session clock. `service` resumes every continuation whose deadline has passed, chaining the
//! next deadline from the previous one so results do not depend on tick size.

use crate::game::BoardEvent;
use crate::grid::{Grid, Tile};
use crate::matcher::{MatchSet, check_matches};
use crate::rules::BoardConfig;
use crate::state::{BoardState, StateMachine};

/// What to do when the pending deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    /// Settle interval over: enter DROPPING and apply gravity.
    Settle,
    /// Fallen tiles have landed: rescan for new runs.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pending {
    pub due_at: f64,
    pub step: CascadeStep,
}

/// Result of clearing a match set from the grid.
#[derive(Debug, Clone, Default)]
pub struct PopOutcome {
    pub popped: Vec<Tile>,
    /// Mean cell centre of popped tiles in board units (feedback only).
    pub centroid: Option<(f64, f64)>,
    pub gained: u32,
}

/// Clear every still-live tile of `matches`. Stale entries are skipped.
/// The rising offset is frozen during cascades, so centres are taken at `rising_offset`.
pub fn pop_tiles(
    grid: &mut Grid,
    matches: &MatchSet,
    config: &BoardConfig,
    rising_offset: f64,
) -> PopOutcome {
    let mut popped = Vec::with_capacity(matches.len());
    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    for tile in matches.iter() {
        if !grid.is_live(tile) {
            continue;
        }
        if let Some(removed) = grid.take(tile.row, tile.col) {
            let (x, y) = config.cell_center(removed.col, removed.row, rising_offset);
            sum_x += x;
            sum_y += y;
            popped.push(removed);
        }
    }
    let n = popped.len();
    PopOutcome {
        centroid: (n > 0).then(|| (sum_x / n as f64, sum_y / n as f64)),
        gained: n as u32 * config.score_per_tile,
        popped,
    }
}

/// Mutable board pieces a cascade touches, borrowed from the session.
pub struct CascadeCtx<'a> {
    pub grid: &'a mut Grid,
    pub machine: &'a mut StateMachine,
    pub score: &'a mut u32,
    pub events: &'a mut Vec<BoardEvent>,
    pub config: &'a BoardConfig,
    pub rising_offset: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CascadeResolver {
    pending: Option<Pending>,
    /// Pop rounds in the current chain (1 = the player's own match).
    rounds: usize,
}

impl CascadeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start resolving `matches` at board time `now`. Expects the board to be IDLE.
    pub fn resolve(&mut self, ctx: &mut CascadeCtx<'_>, matches: &MatchSet, now: f64) {
        self.rounds = 0;
        self.pop_round(ctx, matches, now);
    }

    /// Resume every continuation due by `now`.
    pub fn service(&mut self, ctx: &mut CascadeCtx<'_>, now: f64) {
        while let Some(pending) = self.pending {
            if pending.due_at > now {
                break;
            }
            self.pending = None;
            match pending.step {
                CascadeStep::Settle => self.drop_tiles(ctx, pending.due_at),
                CascadeStep::Drop => self.rescan(ctx, pending.due_at),
            }
        }
    }

    /// Drop any in-flight continuation (restart).
    pub fn cancel(&mut self) {
        self.pending = None;
        self.rounds = 0;
    }

    fn pop_round(&mut self, ctx: &mut CascadeCtx<'_>, matches: &MatchSet, at: f64) {
        ctx.machine.transition(BoardState::Matching);
        let outcome = pop_tiles(ctx.grid, matches, ctx.config, ctx.rising_offset);
        let Some(centroid) = outcome.centroid else {
            log::debug!("match of {} fizzled: every tile went stale", matches.len());
            ctx.events.push(BoardEvent::Fizzled);
            self.finish(ctx);
            return;
        };
        self.rounds += 1;
        *ctx.score = ctx.score.saturating_add(outcome.gained);
        log::debug!(
            "cascade round {}: popped {} (+{}), score {}",
            self.rounds,
            outcome.popped.len(),
            outcome.gained,
            ctx.score
        );
        ctx.events.push(BoardEvent::Popped {
            tiles: outcome.popped,
            centroid,
            gained: outcome.gained,
            chain: self.rounds,
        });
        self.pending = Some(Pending {
            due_at: at + ctx.config.settle_seconds,
            step: CascadeStep::Settle,
        });
    }

    fn drop_tiles(&mut self, ctx: &mut CascadeCtx<'_>, at: f64) {
        ctx.machine.transition(BoardState::Dropping);
        let moved = ctx.grid.compact_columns();
        debug_assert!(ctx.grid.check_consistency());
        if moved > 0 && ctx.config.drop_seconds > 0.0 {
            self.pending = Some(Pending {
                due_at: at + ctx.config.drop_seconds,
                step: CascadeStep::Drop,
            });
        } else {
            self.rescan(ctx, at);
        }
    }

    fn rescan(&mut self, ctx: &mut CascadeCtx<'_>, at: f64) {
        let matches = check_matches(ctx.grid);
        if matches.is_empty() {
            self.finish(ctx);
        } else if self.rounds >= ctx.config.cascade_round_limit() {
            log::warn!("cascade stopped after {} rounds", self.rounds);
            self.finish(ctx);
        } else {
            self.pop_round(ctx, &matches, at);
        }
    }

    fn finish(&mut self, ctx: &mut CascadeCtx<'_>) {
        self.pending = None;
        self.rounds = 0;
        ctx.machine.transition(BoardState::Idle);
    }
}
