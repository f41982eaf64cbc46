//! App: terminal init, main loop, tick and input handling.

use crate::GameConfig;
use crate::game::Session;
use crate::highscores::{FileStore, HighScoreStore};
use crate::input::{Action, key_to_action, mouse_click};
use crate::rise::SpeedMode;
use crate::state::BoardState;
use crate::theme::Theme;
use crate::ui::{BoardLayout, Feedback};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// Longest board step fed to one tick; a stalled terminal does not fast-forward the stack.
const MAX_FRAME_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOption {
    Resume,
    MainMenu,
    Exit,
}

impl PauseOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::MainMenu,
            Self::MainMenu => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::MainMenu => Self::Resume,
            Self::Exit => Self::MainMenu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub selected_mode: SpeedMode,
}

pub struct App<S: HighScoreStore = FileStore> {
    config: GameConfig,
    theme: Theme,
    session: Session<S>,
    screen: Screen,
    /// Board cell (row, col) under the keyboard cursor.
    cursor: (usize, usize),
    menu_state: MenuState,
    pause_selected: PauseOption,
    feedback: Feedback,
    last_frame: Instant,
    /// Board placement from the last draw, for mouse picks.
    layout: Option<BoardLayout>,
}

impl App<FileStore> {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_store(config, theme, FileStore::open(), rng)
    }
}

impl<S: HighScoreStore> App<S> {
    pub fn with_store(config: GameConfig, theme: Theme, store: S, rng: StdRng) -> Self {
        let session = Session::new(config.board.clone(), config.mode, store, rng);
        let screen = if config.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        Self {
            cursor: home_cursor(&session),
            menu_state: MenuState {
                selected_mode: config.mode,
            },
            feedback: Feedback::new(!config.no_animation),
            config,
            theme,
            session,
            screen,
            pause_selected: PauseOption::Resume,
            last_frame: Instant::now(),
            layout: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        log::info!("terminal ready, starting on {:?}", self.screen);

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        if let Err(e) = &result {
            log::error!("main loop failed: {e:#}");
        }
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_budget = Duration::from_secs_f64(1.0 / self.config.frame_rate.clamp(1.0, 240.0));
        self.last_frame = Instant::now();
        while self.screen != Screen::Exit {
            let now = Instant::now();
            self.advance(now);

            terminal.draw(|f| {
                self.layout = crate::ui::draw(
                    f,
                    self.screen,
                    &self.session,
                    &self.theme,
                    self.cursor,
                    &self.menu_state,
                    self.pause_selected,
                    &mut self.feedback,
                    now,
                );
            })?;

            let timeout = frame_budget.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            self.handle_action(key_to_action(key));
                        }
                        Event::Mouse(mouse) => {
                            if let Some((x, y)) = mouse_click(mouse) {
                                self.handle_click(x, y);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Feed the measured frame time to the session and collect its events.
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_frame).min(MAX_FRAME_STEP);
        self.last_frame = now;
        if self.screen != Screen::Playing {
            return;
        }
        self.session.tick(dt.as_secs_f64());
        for event in self.session.drain_events() {
            self.feedback.push(&event, now);
        }
    }

    fn start_game(&mut self) {
        self.session.restart_with(self.menu_state.selected_mode);
        self.feedback.clear();
        self.cursor = home_cursor(&self.session);
        self.pause_selected = PauseOption::Resume;
        self.screen = Screen::Playing;
    }

    fn restart(&mut self) {
        self.session.restart();
        self.feedback.clear();
        self.cursor = home_cursor(&self.session);
    }

    fn handle_action(&mut self, action: Action) {
        match self.screen {
            Screen::Menu => match action {
                Action::CursorLeft | Action::CursorRight | Action::ToggleMode => {
                    self.menu_state.selected_mode = self.menu_state.selected_mode.toggled();
                }
                Action::Pick => self.start_game(),
                Action::Quit => self.screen = Screen::Exit,
                _ => {}
            },
            Screen::Playing => match self.session.state() {
                BoardState::Paused => self.handle_pause_menu(action),
                BoardState::GameOver => match action {
                    Action::Restart | Action::Pick => self.restart(),
                    Action::Quit => self.screen = Screen::Exit,
                    _ => {}
                },
                _ => self.handle_board(action),
            },
            Screen::Exit => {}
        }
    }

    fn handle_board(&mut self, action: Action) {
        let config = self.session.config();
        let (rows, cols) = (config.rows, config.cols);
        let (row, col) = self.cursor;
        match action {
            Action::CursorLeft => self.cursor.1 = col.saturating_sub(1),
            Action::CursorRight => self.cursor.1 = (col + 1).min(cols - 1),
            Action::CursorUp => self.cursor.0 = row.saturating_sub(1),
            Action::CursorDown => self.cursor.0 = (row + 1).min(rows - 1),
            Action::Pick => self.pick(row, col),
            Action::Pause => {
                if self.session.toggle_pause() {
                    self.pause_selected = PauseOption::Resume;
                }
            }
            Action::Quit => {
                // Quit goes through the pause menu when the board can pause.
                if self.session.toggle_pause() {
                    self.pause_selected = PauseOption::Exit;
                } else {
                    self.screen = Screen::Exit;
                }
            }
            // R only restarts from the game-over screen.
            Action::Restart | Action::ToggleMode | Action::None => {}
        }
    }

    fn handle_pause_menu(&mut self, action: Action) {
        match action {
            Action::CursorDown | Action::CursorRight => self.pause_selected = self.pause_selected.next(),
            Action::CursorUp | Action::CursorLeft => self.pause_selected = self.pause_selected.prev(),
            Action::Pick => match self.pause_selected {
                PauseOption::Resume => {
                    self.session.toggle_pause();
                }
                PauseOption::MainMenu => {
                    self.menu_state.selected_mode = self.session.mode();
                    self.screen = Screen::Menu;
                }
                PauseOption::Exit => self.screen = Screen::Exit,
            },
            Action::Pause => {
                self.session.toggle_pause();
            }
            Action::Quit => self.screen = Screen::Exit,
            _ => {}
        }
    }

    fn handle_click(&mut self, x: u16, y: u16) {
        if self.screen != Screen::Playing {
            return;
        }
        let Some(cell) = self.layout.and_then(|l| l.cell_at(x, y)) else {
            return;
        };
        match self.session.state() {
            BoardState::GameOver => self.restart(),
            state if state.accepts_input() => {
                self.cursor = cell;
                self.pick(cell.0, cell.1);
            }
            _ => {}
        }
    }

    fn pick(&mut self, row: usize, col: usize) {
        if let Some(id) = self.session.tile_at(row, col).map(|t| t.id) {
            let outcome = self.session.click(id);
            log::trace!(
                "pick ({row}, {col}): {outcome:?}, selection {:?}",
                self.session.selection()
            );
        }
    }
}

/// Bottom-middle cell: the first tiles are there.
fn home_cursor<S: HighScoreStore>(session: &Session<S>) -> (usize, usize) {
    let config = session.config();
    (config.rows.saturating_sub(1), config.cols / 2)
}
