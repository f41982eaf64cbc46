//! Board state machine: which of rising, input and cascade work may run.

/// Board phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoardState {
    /// Input and rising active.
    #[default]
    Idle,
    /// Input and rising suspended until toggled back.
    Paused,
    /// Tiles popped, waiting for the settle interval.
    Matching,
    /// Gravity applied, waiting for tiles to land before rescanning.
    Dropping,
    /// Terminal until restart.
    GameOver,
}

impl BoardState {
    #[inline]
    pub fn accepts_input(self) -> bool {
        self == Self::Idle
    }

    #[inline]
    pub fn rises(self) -> bool {
        self == Self::Idle
    }

    /// Board time advances (cascade deadlines, rise) only while the game is live.
    #[inline]
    pub fn runs_clock(self) -> bool {
        matches!(self, Self::Idle | Self::Matching | Self::Dropping)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use BoardState::{Dropping, GameOver, Idle, Matching, Paused};
        matches!(
            (self, next),
            (Idle, Paused)
                | (Paused, Idle)
                | (Idle, Matching)
                | (Matching, Dropping)
                | (Matching, Idle)
                | (Dropping, Matching)
                | (Dropping, Idle)
                | (Idle, GameOver)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Paused => "PAUSED",
            Self::Matching => "MATCHING",
            Self::Dropping => "DROPPING",
            Self::GameOver => "GAME_OVER",
        }
    }
}

/// Holds the current state and refuses transitions the board never makes.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: BoardState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> BoardState {
        self.state
    }

    /// Move to `next`. An illegal transition is a bug: it asserts in debug builds and is
    /// logged and refused in release builds.
    pub fn transition(&mut self, next: BoardState) -> bool {
        let ok = self.state.can_transition_to(next);
        debug_assert!(ok, "illegal board transition {:?} -> {:?}", self.state, next);
        if !ok {
            log::error!(
                "refusing board transition {} -> {}",
                self.state.label(),
                next.label()
            );
            return false;
        }
        log::trace!("board {} -> {}", self.state.label(), next.label());
        self.state = next;
        true
    }

    /// IDLE <-> PAUSED. No-op (false) in any other state.
    pub fn toggle_pause(&mut self) -> bool {
        match self.state {
            BoardState::Idle => self.transition(BoardState::Paused),
            BoardState::Paused => self.transition(BoardState::Idle),
            _ => false,
        }
    }

    /// Restart: back to a fresh IDLE from anywhere.
    pub fn reset(&mut self) {
        self.state = BoardState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_only_toggles_from_idle_or_paused() {
        let mut m = StateMachine::new();
        assert!(m.toggle_pause());
        assert_eq!(m.state(), BoardState::Paused);
        assert!(m.toggle_pause());
        assert_eq!(m.state(), BoardState::Idle);
        assert!(m.transition(BoardState::Matching));
        assert!(!m.toggle_pause());
        assert_eq!(m.state(), BoardState::Matching);
    }

    #[test]
    fn test_game_over_only_from_idle() {
        assert!(BoardState::Idle.can_transition_to(BoardState::GameOver));
        for s in [BoardState::Paused, BoardState::Matching, BoardState::Dropping] {
            assert!(!s.can_transition_to(BoardState::GameOver));
        }
        assert!(!BoardState::GameOver.can_transition_to(BoardState::Idle));
    }

    #[test]
    fn test_reset_leaves_game_over() {
        let mut m = StateMachine::new();
        m.transition(BoardState::GameOver);
        m.reset();
        assert_eq!(m.state(), BoardState::Idle);
    }

    #[test]
    fn test_gates() {
        assert!(BoardState::Idle.accepts_input() && BoardState::Idle.rises());
        for s in [BoardState::Paused, BoardState::Matching, BoardState::Dropping, BoardState::GameOver] {
            assert!(!s.accepts_input());
            assert!(!s.rises());
        }
        assert!(BoardState::Dropping.runs_clock());
        assert!(!BoardState::Paused.runs_clock());
    }
}
