//! Crossterm-backed terminal implementation.
//!
//! Renders to stderr (alternate screen, raw mode) so stdout stays free
//! for result emission. The input half wraps `crossterm::event::read`
//! and resolves double-clicks by cell and click interval.

use std::io::{Stderr, Write, stderr};
use std::time::{Duration, Instant};

use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEventKind,
};
use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{cursor, execute, queue};
use tracing::warn;

use crate::ansi::AnsiColor;
use crate::error::TerminalError;

use super::{Backend, ColorPair, EventSource, Key, MouseEvent, TermEvent};

/// Two clicks on the same cell within this window form a double-click.
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);

/// Creates the paired paint and input halves of the terminal.
#[must_use]
pub fn backend_pair() -> (CrosstermScreen, CrosstermEvents) {
    (CrosstermScreen::new(), CrosstermEvents::new())
}

/// Paint half: queues crossterm commands against stderr.
pub struct CrosstermScreen {
    out: Stderr,
    initialized: bool,
}

impl CrosstermScreen {
    fn new() -> Self {
        Self {
            out: stderr(),
            initialized: false,
        }
    }

    fn colors_for(pair: ColorPair) -> (Color, Color) {
        match pair {
            ColorPair::Normal => (Color::Reset, Color::Reset),
            ColorPair::Prompt => (Color::Cyan, Color::Reset),
            ColorPair::Info => (Color::Yellow, Color::Reset),
            ColorPair::Matched => (Color::Green, Color::Reset),
            ColorPair::Current => (Color::Yellow, Color::DarkGrey),
            ColorPair::CurrentMatch => (Color::Green, Color::DarkGrey),
            ColorPair::Marker => (Color::Magenta, Color::Reset),
            ColorPair::Ansi(attr) => (convert_ansi(attr.fg), convert_ansi(attr.bg)),
        }
    }
}

fn convert_ansi(color: AnsiColor) -> Color {
    match color {
        AnsiColor::Default => Color::Reset,
        AnsiColor::Indexed(i) => Color::AnsiValue(i),
        AnsiColor::Rgb(r, g, b) => Color::Rgb { r, g, b },
    }
}

impl Backend for CrosstermScreen {
    fn init(&mut self) -> Result<(), TerminalError> {
        enable_raw_mode().map_err(|e| TerminalError::Init(e.to_string()))?;
        execute!(self.out, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)
            .map_err(|e| TerminalError::Init(e.to_string()))?;
        self.initialized = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.initialized {
            return;
        }
        if let Err(e) = execute!(self.out, LeaveAlternateScreen, DisableMouseCapture, cursor::Show)
        {
            warn!(error = %e, "terminal restore failed");
        }
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "raw mode restore failed");
        }
        self.initialized = false;
    }

    fn max_x(&self) -> u16 {
        crossterm::terminal::size().map_or(80, |(x, _)| x)
    }

    fn max_y(&self) -> u16 {
        crossterm::terminal::size().map_or(24, |(_, y)| y)
    }

    fn move_to(&mut self, y: u16, x: u16) {
        let _ = queue!(self.out, cursor::MoveTo(x, y));
    }

    fn print(&mut self, text: &str) {
        let _ = queue!(self.out, crossterm::style::Print(text));
    }

    fn cprint(&mut self, pair: ColorPair, bold: bool, text: &str) {
        let (fg, bg) = Self::colors_for(pair);
        let _ = queue!(self.out, SetForegroundColor(fg), SetBackgroundColor(bg));
        let bold = bold || matches!(pair, ColorPair::Ansi(attr) if attr.bold);
        if bold {
            let _ = queue!(self.out, SetAttribute(Attribute::Bold));
        }
        let _ = queue!(self.out, crossterm::style::Print(text));
        let _ = queue!(
            self.out,
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Color::Reset),
            SetBackgroundColor(Color::Reset)
        );
    }

    fn clear(&mut self) {
        let _ = queue!(self.out, Clear(ClearType::All));
    }

    fn refresh(&mut self) {
        let _ = self.out.flush();
    }
}

impl Drop for CrosstermScreen {
    fn drop(&mut self) {
        self.close();
    }
}

/// Input half: blocking reads over crossterm's event stream.
pub struct CrosstermEvents {
    last_click: Option<(Instant, u16, u16)>,
}

impl CrosstermEvents {
    fn new() -> Self {
        Self { last_click: None }
    }

    fn translate(&mut self, event: Event) -> Option<TermEvent> {
        match event {
            Event::Key(key) => translate_key(&key),
            Event::Mouse(mouse) => self.translate_mouse(&mouse),
            Event::Resize(_, _) => Some(TermEvent::Resize),
            _ => None,
        }
    }

    fn translate_mouse(&mut self, mouse: &crossterm::event::MouseEvent) -> Option<TermEvent> {
        match mouse.kind {
            MouseEventKind::ScrollUp => Some(TermEvent::Mouse(MouseEvent {
                x: mouse.column,
                y: mouse.row,
                scroll: -1,
                left: false,
                double: false,
            })),
            MouseEventKind::ScrollDown => Some(TermEvent::Mouse(MouseEvent {
                x: mouse.column,
                y: mouse.row,
                scroll: 1,
                left: false,
                double: false,
            })),
            MouseEventKind::Down(MouseButton::Left) => {
                let now = Instant::now();
                let double = self.last_click.is_some_and(|(at, x, y)| {
                    x == mouse.column && y == mouse.row && now.duration_since(at) < DOUBLE_CLICK_WINDOW
                });
                self.last_click = if double { None } else { Some((now, mouse.column, mouse.row)) };
                Some(TermEvent::Mouse(MouseEvent {
                    x: mouse.column,
                    y: mouse.row,
                    scroll: 0,
                    left: true,
                    double,
                }))
            }
            _ => None,
        }
    }
}

fn translate_key(key: &KeyEvent) -> Option<TermEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Char(c) if ctrl => Some(TermEvent::Key(Key::Ctrl(c.to_ascii_lowercase()))),
        KeyCode::Char(c) if alt => Some(TermEvent::Key(Key::Alt(c.to_ascii_lowercase()))),
        KeyCode::Char(c) => Some(TermEvent::Rune(c)),
        KeyCode::Enter => Some(TermEvent::Key(Key::Enter)),
        KeyCode::Esc => Some(TermEvent::Key(Key::Esc)),
        KeyCode::Backspace => Some(TermEvent::Key(Key::Backspace)),
        KeyCode::Delete => Some(TermEvent::Key(Key::Delete)),
        KeyCode::Tab => Some(TermEvent::Key(Key::Tab)),
        KeyCode::BackTab => Some(TermEvent::Key(Key::BackTab)),
        KeyCode::Up => Some(TermEvent::Key(Key::Up)),
        KeyCode::Down => Some(TermEvent::Key(Key::Down)),
        KeyCode::Left => Some(TermEvent::Key(Key::Left)),
        KeyCode::Right => Some(TermEvent::Key(Key::Right)),
        KeyCode::Home => Some(TermEvent::Key(Key::Home)),
        KeyCode::End => Some(TermEvent::Key(Key::End)),
        KeyCode::PageUp => Some(TermEvent::Key(Key::PageUp)),
        KeyCode::PageDown => Some(TermEvent::Key(Key::PageDown)),
        KeyCode::F(n) => Some(TermEvent::Key(Key::F(n))),
        _ => None,
    }
}

impl EventSource for CrosstermEvents {
    fn get_char(&mut self) -> TermEvent {
        loop {
            match crossterm::event::read() {
                Ok(event) => {
                    if let Some(translated) = self.translate(event) {
                        return translated;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "input read failed");
                    return TermEvent::Key(Key::Ctrl('c'));
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_key_translation() {
        let ev = translate_key(&KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(ev, Some(TermEvent::Rune('a')));
        let ev = translate_key(&KeyEvent::new(KeyCode::Char('W'), KeyModifiers::CONTROL));
        assert_eq!(ev, Some(TermEvent::Key(Key::Ctrl('w'))));
        let ev = translate_key(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(ev, Some(TermEvent::Key(Key::Esc)));
    }

    #[test]
    fn test_double_click_same_cell() {
        let mut events = CrosstermEvents::new();
        let click = crossterm::event::MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 4,
            row: 7,
            modifiers: KeyModifiers::NONE,
        };
        let first = events.translate_mouse(&click);
        let second = events.translate_mouse(&click);
        match (first, second) {
            (Some(TermEvent::Mouse(a)), Some(TermEvent::Mouse(b))) => {
                assert!(!a.double);
                assert!(b.double);
            }
            other => panic!("unexpected translation: {other:?}"),
        }
    }

    #[test]
    fn test_double_click_different_cell_resets() {
        let mut events = CrosstermEvents::new();
        let mut click = crossterm::event::MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 4,
            row: 7,
            modifiers: KeyModifiers::NONE,
        };
        let _ = events.translate_mouse(&click);
        click.row = 8;
        match events.translate_mouse(&click) {
            Some(TermEvent::Mouse(m)) => assert!(!m.double),
            other => panic!("unexpected translation: {other:?}"),
        }
    }
}
