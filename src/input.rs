//! Key and mouse bindings: arrows or vim-style hjkl.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    /// Select the tile under the cursor (or confirm a menu entry).
    Pick,
    Pause,
    Restart,
    /// Switch between time and score mode on the menu.
    ToggleMode,
    Quit,
    None,
}

/// Map key event to an action. Supports both normal (arrows, Enter) and vim (hjkl) keys.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') => Action::Quit,
        KeyCode::Char('p' | 'P') | KeyCode::Esc => Action::Pause,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Char('m' | 'M') | KeyCode::Tab => Action::ToggleMode,
        KeyCode::Left | KeyCode::Char('h') => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') => Action::CursorRight,
        KeyCode::Up | KeyCode::Char('k') => Action::CursorUp,
        KeyCode::Down | KeyCode::Char('j') => Action::CursorDown,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Pick,
        _ => Action::None,
    }
}

/// Terminal cell of a left click, if this event is one.
pub fn mouse_click(event: MouseEvent) -> Option<(u16, u16)> {
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => Some((event.column, event.row)),
        _ => None,
    }
}
