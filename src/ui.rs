//! Layout and drawing: menu, board, sidebar, pause menu, game over, pop feedback.

use crate::app::{MenuState, PauseOption, Screen};
use crate::game::{BoardEvent, Session};
use crate::grid::Tile;
use crate::highscores::HighScoreStore;
use crate::rise::SpeedMode;
use crate::rules::BoardConfig;
use crate::state::BoardState;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal cells per board cell, largest first; the first that fits the terminal wins.
const CELL_SIZES: [(u16, u16); 3] = [(6, 3), (4, 2), (2, 1)];

const SIDEBAR_WIDTH: u16 = 28;

/// Pop fade (TachyonFX); finishes before the settle interval hands the cells to gravity.
const POP_FADE_MS: u32 = 100;

const POPUP_LIFETIME: Duration = Duration::from_millis(700);

/// Where the board sits on screen this frame. Also maps mouse positions back to cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    /// Board cells only, no border.
    pub inner: Rect,
    pub cell_w: u16,
    pub cell_h: u16,
    pub cols: u16,
    pub rows: u16,
    /// Terminal rows the board has risen since the last whole rise-step.
    pub shift: u16,
}

impl BoardLayout {
    pub fn new(area: Rect, config: &BoardConfig, rising_offset: f64) -> Self {
        let cols = config.cols as u16;
        let rows = config.rows as u16;
        let (cell_w, cell_h) = CELL_SIZES
            .iter()
            .copied()
            .find(|&(w, h)| cols * w + 2 + SIDEBAR_WIDTH <= area.width && rows * h + 2 <= area.height)
            .unwrap_or(CELL_SIZES[CELL_SIZES.len() - 1]);
        let board_w = cols * cell_w + 2;
        let board_h = rows * cell_h + 2;
        let x = area.x + area.width.saturating_sub(board_w + SIDEBAR_WIDTH) / 2;
        let y = area.y + area.height.saturating_sub(board_h) / 2;
        let inner = Rect {
            x: x + 1,
            y: y + 1,
            width: (cols * cell_w).min(area.width.saturating_sub(2)),
            height: (rows * cell_h).min(area.height.saturating_sub(2)),
        };
        let fraction = (rising_offset / config.tile_size).clamp(0.0, 1.0);
        let shift = ((fraction * f64::from(cell_h)).floor() as u16).min(cell_h.saturating_sub(1));
        Self {
            inner,
            cell_w,
            cell_h,
            cols,
            rows,
            shift,
        }
    }

    /// Board with its border.
    pub fn outer(&self) -> Rect {
        Rect {
            x: self.inner.x.saturating_sub(1),
            y: self.inner.y.saturating_sub(1),
            width: self.inner.width + 2,
            height: self.inner.height + 2,
        }
    }

    /// Sidebar to the right of the board, clipped to `area`.
    pub fn sidebar(&self, area: Rect) -> Rect {
        let outer = self.outer();
        let x = outer.x + outer.width;
        Rect {
            x,
            y: outer.y,
            width: SIDEBAR_WIDTH.min(area.right().saturating_sub(x)),
            height: outer.height.min(area.bottom().saturating_sub(outer.y)),
        }
    }

    /// Painted part of a cell: one column and one row of gap when there is room.
    fn tile_size(&self) -> (u16, u16) {
        let w = if self.cell_w > 2 { self.cell_w - 1 } else { self.cell_w };
        let h = if self.cell_h > 2 { self.cell_h - 1 } else { self.cell_h };
        (w, h)
    }

    /// Top-left terminal position of board cell (row, col). Row `rows` is the pending row.
    fn cell_origin(&self, row: usize, col: usize) -> (i32, i32) {
        (
            i32::from(self.inner.x) + col as i32 * i32::from(self.cell_w),
            i32::from(self.inner.y) + row as i32 * i32::from(self.cell_h) - i32::from(self.shift),
        )
    }

    fn visible(&self, x: i32, y: i32) -> Option<(u16, u16)> {
        let (x, y) = (u16::try_from(x).ok()?, u16::try_from(y).ok()?);
        self.inner.contains(Position { x, y }).then_some((x, y))
    }

    /// Board cell (row, col) drawn at terminal position (x, y), if any. The pending row is not
    /// a cell.
    pub fn cell_at(&self, x: u16, y: u16) -> Option<(usize, usize)> {
        if !self.inner.contains(Position { x, y }) {
            return None;
        }
        let col = (x - self.inner.x) / self.cell_w;
        let row = (y - self.inner.y + self.shift) / self.cell_h;
        (col < self.cols && row < self.rows).then_some((row as usize, col as usize))
    }

    /// Terminal position of a point in board units.
    fn board_point(&self, config: &BoardConfig, (bx, by): (f64, f64)) -> (i32, i32) {
        let col = (bx - config.board_x) / config.tile_size;
        let row = (by - config.board_y) / config.tile_size;
        (
            i32::from(self.inner.x) + (col * f64::from(self.cell_w)).round() as i32,
            i32::from(self.inner.y) + (row * f64::from(self.cell_h)).round() as i32,
        )
    }
}

struct ScorePopup {
    text: String,
    at: (f64, f64),
    born: Instant,
}

/// Pop fades and floating score text, fed from session events between frames.
pub struct Feedback {
    animate: bool,
    /// Popped tiles still fading out.
    ghosts: Vec<Tile>,
    fade: Option<Effect>,
    fade_process_time: Option<Instant>,
    popups: Vec<ScorePopup>,
    new_record: bool,
}

impl Feedback {
    pub fn new(animate: bool) -> Self {
        Self {
            animate,
            ghosts: Vec::new(),
            fade: None,
            fade_process_time: None,
            popups: Vec::new(),
            new_record: false,
        }
    }

    pub fn push(&mut self, event: &BoardEvent, now: Instant) {
        match event {
            BoardEvent::Popped {
                tiles,
                centroid,
                gained,
                chain,
            } => {
                if self.animate {
                    self.ghosts.extend(tiles.iter().copied());
                    self.fade = None;
                    self.fade_process_time = None;
                }
                let text = if *chain > 1 {
                    format!("+{gained} x{chain}")
                } else {
                    format!("+{gained}")
                };
                self.popups.push(ScorePopup {
                    text,
                    at: *centroid,
                    born: now,
                });
            }
            BoardEvent::GameOver { new_record, .. } => self.new_record = *new_record,
            BoardEvent::Fizzled | BoardEvent::RiseStep { .. } => {}
        }
    }

    pub fn clear(&mut self) {
        self.ghosts.clear();
        self.fade = None;
        self.fade_process_time = None;
        self.popups.clear();
        self.new_record = false;
    }

    pub fn new_record(&self) -> bool {
        self.new_record
    }

    fn expire(&mut self, now: Instant) {
        self.popups
            .retain(|p| now.saturating_duration_since(p.born) < POPUP_LIFETIME);
        if self.fade.as_ref().is_some_and(Effect::done) {
            self.ghosts.clear();
            self.fade = None;
            self.fade_process_time = None;
        }
    }

    /// Fade the popped cells to the board background (TachyonFX) and draw score popups.
    fn render(
        &mut self,
        frame: &mut Frame,
        theme: &Theme,
        config: &BoardConfig,
        layout: &BoardLayout,
        now: Instant,
    ) {
        if !self.ghosts.is_empty() {
            let delta = self
                .fade_process_time
                .map(|t| now.saturating_duration_since(t))
                .unwrap_or(Duration::ZERO);
            let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
            self.fade_process_time = Some(now);
            if self.fade.is_none() {
                let positions = ghost_positions(layout, &self.ghosts);
                let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
                    positions.contains(&(pos.x, pos.y))
                }));
                let bg = theme.bg;
                self.fade = Some(
                    fx::fade_to(bg, bg, (POP_FADE_MS, Interpolation::Linear))
                        .with_filter(filter)
                        .with_area(layout.inner),
                );
            }
            if let Some(effect) = &mut self.fade {
                frame.render_effect(effect, layout.inner, TfxDuration::from_millis(delta_ms));
            }
        }

        let style = Style::default()
            .fg(theme.title)
            .add_modifier(Modifier::BOLD);
        for popup in &self.popups {
            let age = now.saturating_duration_since(popup.born).as_secs_f64()
                / POPUP_LIFETIME.as_secs_f64();
            let (x, y) = layout.board_point(config, popup.at);
            let y = y - (age * f64::from(layout.cell_h)).round() as i32;
            let x = x - popup.text.len() as i32 / 2;
            let Some((x, y)) = layout.visible(x.max(i32::from(layout.inner.x)), y) else {
                continue;
            };
            let room = layout.inner.right().saturating_sub(x) as usize;
            let text: String = popup.text.chars().take(room).collect();
            frame.buffer_mut().set_string(x, y, text, style);
        }
    }
}

/// Terminal positions covered by fading tiles.
fn ghost_positions(layout: &BoardLayout, ghosts: &[Tile]) -> HashSet<(u16, u16)> {
    let (tw, th) = layout.tile_size();
    let mut set = HashSet::new();
    for ghost in ghosts {
        let (ox, oy) = layout.cell_origin(ghost.row, ghost.col);
        for dy in 0..th {
            for dx in 0..tw {
                if let Some(pos) = layout.visible(ox + i32::from(dx), oy + i32::from(dy)) {
                    set.insert(pos);
                }
            }
        }
    }
    set
}

/// How close the highest tile is to the danger line: 0 for an empty board, 1 at the line.
pub fn stack_pressure<S: HighScoreStore>(session: &Session<S>) -> f64 {
    let config = session.config();
    let Some(top) = session.tiles().map(|t| t.row).min() else {
        return 0.0;
    };
    let headroom = config.tile_top_y(top, session.rising_offset()) - config.danger_line_y;
    let span = config.rows as f64 * config.tile_size - (config.danger_line_y - config.board_y);
    (1.0 - headroom / span).clamp(0.0, 1.0)
}

/// Draw the current screen. Returns the board layout when the board is on screen, for mouse
/// picks.
pub fn draw<S: HighScoreStore>(
    frame: &mut Frame,
    screen: Screen,
    session: &Session<S>,
    theme: &Theme,
    cursor: (usize, usize),
    menu_state: &MenuState,
    pause_selected: PauseOption,
    feedback: &mut Feedback,
    now: Instant,
) -> Option<BoardLayout> {
    let area = frame.area();
    feedback.expire(now);
    match screen {
        Screen::Menu => {
            draw_menu(frame, theme, menu_state, session.high_score(), area);
            None
        }
        Screen::Playing => {
            let layout = BoardLayout::new(area, session.config(), session.rising_offset());
            let cursor = session.state().accepts_input().then_some(cursor);
            draw_board(frame, session, theme, &layout, cursor, &feedback.ghosts);
            draw_sidebar(frame, session, theme, layout.sidebar(area));
            feedback.render(frame, theme, session.config(), &layout, now);
            match session.state() {
                BoardState::Paused => draw_pause_menu(frame, theme, pause_selected),
                BoardState::GameOver => {
                    draw_game_over(frame, session, theme, &layout, feedback.new_record());
                }
                _ => {}
            }
            Some(layout)
        }
        Screen::Exit => None,
    }
}

fn paint_tile(
    buf: &mut Buffer,
    layout: &BoardLayout,
    row: usize,
    col: usize,
    style: Style,
    glyph: char,
) {
    let (ox, oy) = layout.cell_origin(row, col);
    let (tw, th) = layout.tile_size();
    for dy in 0..th {
        for dx in 0..tw {
            if let Some(pos) = layout.visible(ox + i32::from(dx), oy + i32::from(dy)) {
                buf[pos].set_char(' ').set_style(style);
            }
        }
    }
    let centre = (ox + i32::from(tw / 2), oy + i32::from(th / 2));
    if let Some(pos) = layout.visible(centre.0, centre.1) {
        buf[pos].set_char(glyph);
    }
}

fn draw_board<S: HighScoreStore>(
    frame: &mut Frame,
    session: &Session<S>,
    theme: &Theme,
    layout: &BoardLayout,
    cursor: Option<(usize, usize)>,
    ghosts: &[Tile],
) {
    let buf = frame.buffer_mut();
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .render(layout.outer(), buf);
    let inner = layout.inner;
    for y in inner.y..inner.bottom() {
        for x in inner.x..inner.right() {
            buf[(x, y)].set_char(' ').set_style(Style::default().bg(theme.bg));
        }
    }

    for tile in session.pending_row() {
        let style = Style::default()
            .fg(theme.bg)
            .bg(theme.tile_color(tile.kind))
            .add_modifier(Modifier::DIM);
        paint_tile(buf, layout, layout.rows as usize, tile.col, style, Theme::tile_glyph(tile.kind));
    }
    for ghost in ghosts {
        if session.tile_at(ghost.row, ghost.col).is_none() {
            let style = Style::default().fg(theme.bg).bg(theme.tile_color(ghost.kind));
            paint_tile(buf, layout, ghost.row, ghost.col, style, Theme::tile_glyph(ghost.kind));
        }
    }
    for tile in session.tiles() {
        let style = if session.is_selected(tile.id) {
            Style::default()
                .fg(theme.tile_color(tile.kind))
                .bg(theme.selected)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.bg).bg(theme.tile_color(tile.kind))
        };
        paint_tile(buf, layout, tile.row, tile.col, style, Theme::tile_glyph(tile.kind));
    }

    if let Some((row, col)) = cursor {
        let (ox, oy) = layout.cell_origin(row, col);
        let (tw, th) = layout.tile_size();
        let mid = oy + i32::from(th / 2);
        let style = Style::default()
            .fg(theme.title)
            .add_modifier(Modifier::BOLD);
        for (x, ch) in [(ox, '['), (ox + i32::from(tw) - 1, ']')] {
            if let Some(pos) = layout.visible(x, mid) {
                buf[pos].set_char(ch).set_style(style);
            }
        }
    }

    // Danger line along the top border.
    let pressure = stack_pressure(session);
    let mut danger = Style::default().fg(theme.danger).bg(theme.bg);
    if pressure > 0.75 {
        danger = danger.add_modifier(Modifier::BOLD);
    }
    let y = inner.y.saturating_sub(1);
    for x in inner.x..inner.right() {
        buf[(x, y)].set_char('╌').set_style(danger);
    }
}

fn draw_sidebar<S: HighScoreStore>(frame: &mut Frame, session: &Session<S>, theme: &Theme, area: Rect) {
    if area.width < 4 {
        return;
    }
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Stats (border + score, best, mode, speed, rising)
            Constraint::Length(4), // Status
            Constraint::Length(3), // Stack gauge
            Constraint::Min(0),    // Keys
        ])
        .split(area);

    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let rising = if session.start_delay_left() > 0.0 {
        format!("in {:.1}s", session.start_delay_left())
    } else {
        format!("{:.1}/s", session.rise_speed())
    };
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Score: ", session.score().to_string()),
        stat("Best: ", session.high_score().to_string()),
        stat("Mode: ", session.mode().label().to_string()),
        stat("Rising: ", rising),
        stat("State: ", session.state().label().to_string()),
    ];
    Paragraph::new(Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    let status_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let status_inner = status_block.inner(chunks[1]);
    status_block.render(chunks[1], frame.buffer_mut());
    Paragraph::new(Span::styled(session.status().to_string(), fg_style))
        .wrap(Wrap { trim: true })
        .render(status_inner, frame.buffer_mut());

    let pressure = stack_pressure(session);
    let bar_color = if pressure > 0.75 {
        theme.danger
    } else if pressure > 0.5 {
        Color::Yellow
    } else {
        Color::Green
    };
    Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled("Stack", title_style)),
        )
        .ratio(pressure)
        .label("")
        .gauge_style(Style::default().fg(bar_color).bg(theme.bg))
        .render(chunks[2], frame.buffer_mut());

    let keys = vec![
        Line::from(Span::styled("Arrows/hjkl  Move", fg_style)),
        Line::from(Span::styled("Enter/Space  Pick", fg_style)),
        Line::from(Span::styled("Click        Pick", fg_style)),
        Line::from(Span::styled("P/Esc        Pause", fg_style)),
        Line::from(Span::styled("R            Play again", fg_style)),
        Line::from(Span::styled("Q            Quit", fg_style)),
    ];
    Paragraph::new(Text::from(keys))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled("Keys", title_style)),
        )
        .render(chunks[3], frame.buffer_mut());
}

fn centered(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn fill_bg(buf: &mut Buffer, rect: Rect, bg: Color) {
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            buf[(x, y)].set_char(' ').set_style(Style::default().bg(bg));
        }
    }
}

fn draw_menu(frame: &mut Frame, theme: &Theme, menu_state: &MenuState, best: u32, area: Rect) {
    let popup = centered(area, 48, 16);
    let title = Line::from(vec![
        Span::styled(
            " Pop ",
            Style::default()
                .fg(theme.tile_color(crate::grid::TileKind(2)))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " tiles ",
            Style::default()
                .fg(theme.main_fg)
                .add_modifier(Modifier::BOLD),
        ),
    ]);
    let highlight = Style::default()
        .fg(Color::Black)
        .bg(theme.title)
        .add_modifier(Modifier::BOLD);
    let normal = Style::default().fg(theme.main_fg);
    let tab = |mode: SpeedMode, label: &'static str| {
        Span::styled(label, if menu_state.selected_mode == mode { highlight } else { normal })
    };
    let blurb = match menu_state.selected_mode {
        SpeedMode::Time => "The stack speeds up the longer you last.",
        SpeedMode::Score => "The stack speeds up as your score grows.",
    };
    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        Line::from(Span::styled(
            "Pick any three matching tiles",
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(Span::styled(
            "before the stack reaches the top.",
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
        Line::from(vec![tab(SpeedMode::Time, " TIME "), Span::raw("   "), tab(SpeedMode::Score, " SCORE ")]),
        Line::from(Span::styled(blurb, normal)),
        Line::from(""),
        Line::from(vec![
            Span::styled("Best: ", Style::default().fg(theme.title)),
            Span::styled(best.to_string(), normal),
        ]),
        Line::from(""),
        Line::from(Span::styled(" ←/→ Mode   Enter Start   Q Quit ", normal)),
    ];
    let buf = frame.buffer_mut();
    fill_bg(buf, popup, theme.bg);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, buf);
}

fn draw_pause_menu(frame: &mut Frame, theme: &Theme, selected: PauseOption) {
    let rect = centered(frame.area(), 24, 8);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Paused ");
    fill_bg(frame.buffer_mut(), rect, theme.bg);
    let inner = block.inner(rect);
    block.render(rect, frame.buffer_mut());

    let options = [
        (PauseOption::Resume, " Resume "),
        (PauseOption::MainMenu, " Main Menu "),
        (PauseOption::Exit, " Exit Game "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default()
                .fg(theme.bg)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.title)
        };
        let x = inner.x + inner.width.saturating_sub(label.len() as u16) / 2;
        let y = inner.y + 1 + i as u16 * 2;
        if y < inner.bottom() {
            frame.buffer_mut().set_string(x, y, label, style);
        }
    }
}

fn draw_game_over<S: HighScoreStore>(
    frame: &mut Frame,
    session: &Session<S>,
    theme: &Theme,
    layout: &BoardLayout,
    new_record: bool,
) {
    let popup = centered(layout.outer(), 30, 11);
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(theme.danger),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", session.score()), fg)),
        Line::from(Span::styled(format!(" Best: {} ", session.high_score()), fg)),
    ];
    if new_record {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(session.status().to_string(), fg)));
    lines.push(Line::from(Span::styled(" Q — Quit ", fg)));
    let buf = frame.buffer_mut();
    fill_bg(buf, popup, theme.bg);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Pop tiles ", theme.title)),
        )
        .render(popup, buf);
}
