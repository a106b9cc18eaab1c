//! Terminal backend contract.
//!
//! The engine talks to the terminal through two narrow seams: a
//! [`Backend`] for painting (cursor movement, plain and colored text,
//! clear/refresh) and an [`EventSource`] for blocking input. The two
//! halves are separate traits because they live on different threads —
//! the painter must not be blocked by a pending `get_char`. The
//! concrete crossterm implementation renders to stderr so stdout stays
//! reserved for result emission.

mod crossterm_backend;

pub use crossterm_backend::{CrosstermEvents, CrosstermScreen, backend_pair};

use crate::ansi::AnsiAttr;
use crate::error::TerminalError;

/// Non-rune keys delivered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Enter / return.
    Enter,
    /// Escape.
    Esc,
    /// Backspace.
    Backspace,
    /// Forward delete.
    Delete,
    /// Tab.
    Tab,
    /// Shift-tab.
    BackTab,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Home.
    Home,
    /// End.
    End,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// Control chord, lowercase letter.
    Ctrl(char),
    /// Alt chord.
    Alt(char),
    /// Function key.
    F(u8),
}

/// A mouse event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
    /// Wheel movement: negative scrolls up, positive down.
    pub scroll: i8,
    /// Left button pressed.
    pub left: bool,
    /// Second click on the same cell within the double-click window.
    pub double: bool,
}

/// One unit of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    /// A printable character.
    Rune(char),
    /// A key code.
    Key(Key),
    /// A mouse action.
    Mouse(MouseEvent),
    /// The terminal was resized.
    Resize,
}

/// Semantic color pairs of the UI; the backend maps them to concrete
/// colors. `Ansi` carries attributes recovered from `--ansi` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPair {
    /// Plain list text.
    Normal,
    /// The prompt marker and query.
    Prompt,
    /// The match-count info line.
    Info,
    /// Matched ranges within a list row.
    Matched,
    /// The cursor row.
    Current,
    /// Matched ranges within the cursor row.
    CurrentMatch,
    /// The multi-select marker.
    Marker,
    /// Producer-supplied colors.
    Ansi(AnsiAttr),
}

/// Blocking input half of the terminal contract.
pub trait EventSource: Send {
    /// Blocks until the next input event.
    fn get_char(&mut self) -> TermEvent;
}

/// Painting half of the terminal contract.
pub trait Backend: Send {
    /// Takes over the terminal (raw mode, alternate screen).
    fn init(&mut self) -> Result<(), TerminalError>;
    /// Restores the terminal.
    fn close(&mut self);
    /// Number of columns.
    fn max_x(&self) -> u16;
    /// Number of rows.
    fn max_y(&self) -> u16;
    /// Moves the paint cursor to `(y, x)`.
    fn move_to(&mut self, y: u16, x: u16);
    /// Prints plain text at the paint cursor.
    fn print(&mut self, text: &str);
    /// Prints colored text at the paint cursor.
    fn cprint(&mut self, pair: ColorPair, bold: bool, text: &str);
    /// Clears the screen.
    fn clear(&mut self);
    /// Flushes queued paint operations.
    fn refresh(&mut self);
}

/// Canonical display name of an input event, as used by `--expect`.
#[must_use]
pub fn event_name(event: &TermEvent) -> Option<String> {
    match event {
        TermEvent::Key(key) => Some(match key {
            Key::Enter => "enter".to_string(),
            Key::Esc => "esc".to_string(),
            Key::Backspace => "bspace".to_string(),
            Key::Delete => "del".to_string(),
            Key::Tab => "tab".to_string(),
            Key::BackTab => "btab".to_string(),
            Key::Up => "up".to_string(),
            Key::Down => "down".to_string(),
            Key::Left => "left".to_string(),
            Key::Right => "right".to_string(),
            Key::Home => "home".to_string(),
            Key::End => "end".to_string(),
            Key::PageUp => "pgup".to_string(),
            Key::PageDown => "pgdn".to_string(),
            Key::Ctrl(c) => format!("ctrl-{c}"),
            Key::Alt(c) => format!("alt-{c}"),
            Key::F(n) => format!("f{n}"),
        }),
        TermEvent::Rune(_) | TermEvent::Mouse(_) | TermEvent::Resize => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(event_name(&TermEvent::Key(Key::Enter)).as_deref(), Some("enter"));
        assert_eq!(event_name(&TermEvent::Key(Key::Ctrl('o'))).as_deref(), Some("ctrl-o"));
        assert_eq!(event_name(&TermEvent::Key(Key::F(3))).as_deref(), Some("f3"));
        assert_eq!(event_name(&TermEvent::Rune('x')), None);
    }
}
