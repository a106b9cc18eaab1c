//! The terminal actor: query state, selection, and the redraw loop.
//!
//! Two sub-loops run concurrently. The input loop blocks on the
//! backend's event stream, translates each event through the fixed
//! default keymap into actions, mutates the shared state, and posts
//! targeted repaint requests (prompt, info, list, or a full redraw) to
//! the terminal's private mailbox — plus a `SearchNew` on the global
//! mailbox whenever the query changes. The paint loop waits on the
//! private mailbox and repaints only the affected panels under the
//! state mutex. Critical sections stay short: all terminal I/O happens
//! with pre-rendered strings.

mod input;
mod selection;

pub use input::QueryBuffer;
pub use selection::Selection;

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::ansi::AnsiAttr;
use crate::error::{EXIT_INTERRUPT, EXIT_NO_MATCH, EXIT_OK, TerminalError};
use crate::event::{CoreEvent, EventBox, EventType};
use crate::history::History;
use crate::item::{Item, MatchedItem};
use crate::matcher::Merger;
use crate::term::{Backend, ColorPair, EventSource, Key, MouseEvent, TermEvent, event_name};

/// Keys of the terminal's private mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermRequest {
    /// Repaint the prompt line.
    Prompt,
    /// Repaint the info line.
    Info,
    /// Repaint the list panel.
    List,
    /// Clear and repaint everything (resize, ctrl-l).
    Redraw,
    /// Re-initialize the backend, then repaint (SIGCONT after a
    /// job-control stop).
    Reinit,
    /// Tear the paint loop down.
    Close,
}

/// Payloads on the terminal mailbox.
pub enum TermPayload {
    /// Payload-free repaint request.
    Notify,
}

/// Every user-triggerable operation of the default keymap; also the
/// vocabulary of the admin endpoint's `POST /` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a rune at the cursor.
    Rune(char),
    /// Accept the current selection.
    Accept,
    /// Abort with exit code 130.
    Abort,
    /// Move the query cursor to column zero.
    BeginningOfLine,
    /// Move the query cursor past the last rune.
    EndOfLine,
    /// Move the query cursor one rune left.
    BackwardChar,
    /// Move the query cursor one rune right.
    ForwardChar,
    /// Move the query cursor one word left.
    BackwardWord,
    /// Move the query cursor one word right.
    ForwardWord,
    /// Delete the rune before the cursor.
    BackwardDeleteChar,
    /// Delete the rune under the cursor.
    DeleteChar,
    /// Kill from the cursor to the end of the query.
    KillLine,
    /// Kill the query before the cursor.
    UnixLineDiscard,
    /// Kill the word before the cursor.
    UnixWordRubout,
    /// Re-insert the last killed text.
    Yank,
    /// Replace the whole query.
    ChangeQuery(String),
    /// Clear the query.
    ClearQuery,
    /// Move the list cursor up.
    Up,
    /// Move the list cursor down.
    Down,
    /// Jump to the best match.
    First,
    /// Jump to the worst match.
    Last,
    /// Move the list cursor one page up.
    PageUp,
    /// Move the list cursor one page down.
    PageDown,
    /// Toggle the current item (`--multi`).
    Toggle,
    /// Toggle and move towards worse matches.
    ToggleDown,
    /// Toggle and move towards better matches.
    ToggleUp,
    /// Toggle every matched item.
    ToggleAll,
    /// Select every matched item.
    SelectAll,
    /// Deselect every matched item.
    DeselectAll,
    /// Recall the previous history entry.
    PreviousHistory,
    /// Recall the next history entry.
    NextHistory,
    /// Full repaint.
    Redraw,
    /// No-op.
    Ignore,
}

impl Action {
    /// Parses one admin-endpoint action, e.g. `accept`, `up`, or
    /// `change-query(foo)`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("change-query(") {
            return rest.strip_suffix(')').map(|q| Self::ChangeQuery(q.to_string()));
        }
        match s {
            "accept" => Some(Self::Accept),
            "abort" => Some(Self::Abort),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "first" | "top" => Some(Self::First),
            "last" => Some(Self::Last),
            "page-up" => Some(Self::PageUp),
            "page-down" => Some(Self::PageDown),
            "toggle" => Some(Self::Toggle),
            "toggle-all" => Some(Self::ToggleAll),
            "select-all" => Some(Self::SelectAll),
            "deselect-all" => Some(Self::DeselectAll),
            "clear-query" => Some(Self::ClearQuery),
            "redraw" => Some(Self::Redraw),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user accepted; selected items are emitted.
    Accept,
    /// The user aborted (esc / ctrl-c / SIGINT).
    Abort,
    /// `--exit-0`: the final result set was empty.
    NoMatch,
}

impl Outcome {
    /// The process exit code for this outcome, given whether any item
    /// was emitted.
    #[must_use]
    pub const fn exit_code(self, emitted: bool) -> i32 {
        match self {
            Self::Accept => {
                if emitted {
                    EXIT_OK
                } else {
                    EXIT_NO_MATCH
                }
            }
            Self::Abort => EXIT_INTERRUPT,
            Self::NoMatch => EXIT_NO_MATCH,
        }
    }
}

/// Everything printed on exit.
pub struct TermOutput {
    /// How the session ended.
    pub outcome: Outcome,
    /// Final query text.
    pub query: String,
    /// Name of the accepting key when `--expect` captured one.
    pub pressed: Option<String>,
    /// Items to emit, in selection order.
    pub selected: Vec<Arc<Item>>,
}

/// Session-fixed terminal configuration.
pub struct TermConfig {
    /// Prompt string rendered before the query.
    pub prompt: String,
    /// Multi-select mode (`--multi`).
    pub multi: bool,
    /// Key names from `--expect` that accept and are reported.
    pub expect: Vec<String>,
    /// Initial query (`--query`).
    pub initial_query: String,
    /// Query history (`--history`).
    pub history: Option<History>,
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            multi: false,
            expect: Vec::new(),
            initial_query: String::new(),
            history: None,
        }
    }
}

struct TermState {
    input: QueryBuffer,
    selection: Selection,
    merger: Arc<Merger>,
    cursor: usize,
    offset: usize,
    total: usize,
    reading: bool,
    progress: Option<f32>,
    failure: Option<String>,
    pressed: Option<String>,
    outcome: Option<Outcome>,
    history: Option<History>,
}

/// The terminal actor.
pub struct Terminal {
    state: Mutex<TermState>,
    reqbox: EventBox<TermRequest, TermPayload>,
    global: Arc<EventBox<EventType, CoreEvent>>,
    prompt: String,
    multi: bool,
    expect: Vec<String>,
}

impl Terminal {
    /// Creates the terminal actor.
    #[must_use]
    pub fn new(config: TermConfig, global: Arc<EventBox<EventType, CoreEvent>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TermState {
                input: QueryBuffer::with_query(&config.initial_query),
                selection: Selection::new(),
                merger: Arc::new(Merger::default()),
                cursor: 0,
                offset: 0,
                total: 0,
                reading: true,
                progress: None,
                failure: None,
                pressed: None,
                outcome: None,
                history: config.history,
            }),
            reqbox: EventBox::new(),
            global,
            prompt: config.prompt,
            multi: config.multi,
            expect: config.expect,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TermState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -----------------------------------------------------------------
    // Coordinator-facing surface
    // -----------------------------------------------------------------

    /// Current query text.
    #[must_use]
    pub fn query(&self) -> String {
        self.lock().input.as_string()
    }

    /// Updates the displayed item count while reading.
    pub fn set_count(&self, total: usize, reading: bool) {
        let mut state = self.lock();
        state.total = total;
        state.reading = reading;
        drop(state);
        self.reqbox.set(TermRequest::Info, TermPayload::Notify);
    }

    /// Updates the scan progress indicator.
    pub fn set_progress(&self, fraction: f32) {
        self.lock().progress = Some(fraction);
        self.reqbox.set(TermRequest::Info, TermPayload::Notify);
    }

    /// Records a producer failure for the info line.
    pub fn set_failure(&self, message: Option<String>) {
        self.lock().failure = message;
        self.reqbox.set(TermRequest::Info, TermPayload::Notify);
    }

    /// Installs the merger of a completed scan.
    pub fn set_merger(&self, merger: Arc<Merger>) {
        let mut state = self.lock();
        state.merger = merger;
        state.progress = None;
        clamp_cursor(&mut state);
        drop(state);
        self.reqbox.set(TermRequest::List, TermPayload::Notify);
        self.reqbox.set(TermRequest::Info, TermPayload::Notify);
    }

    /// Requests a full repaint (SIGWINCH, ctrl-l).
    pub fn request_redraw(&self) {
        self.reqbox.set(TermRequest::Redraw, TermPayload::Notify);
    }

    /// Requests a backend re-initialization (SIGCONT after a
    /// job-control stop left the terminal in cooked mode).
    pub fn request_reinit(&self) {
        self.reqbox.set(TermRequest::Reinit, TermPayload::Notify);
    }

    /// Applies actions injected from outside the input loop (admin
    /// endpoint). Safe from any thread; the state mutex serializes
    /// against the input loop and each action posts its own repaint
    /// requests.
    pub fn post_actions(&self, actions: &[Action]) {
        for action in actions {
            if self.apply_action(action) {
                break;
            }
        }
    }

    /// Accepts the single remaining match (`--select-1`).
    pub fn auto_accept(&self) {
        self.apply_action(&Action::Accept);
    }

    /// Ends the session with no match (`--exit-0`).
    pub fn exit_no_match(&self) {
        self.finish(Outcome::NoMatch);
    }

    /// Aborts from the signal watcher.
    pub fn abort(&self) {
        self.finish(Outcome::Abort);
    }

    /// Status snapshot for the admin endpoint: `(query, reading,
    /// total, matched, selected, current item text)`.
    #[must_use]
    pub fn status(&self) -> (String, bool, usize, usize, usize, Option<String>) {
        let state = self.lock();
        let current = state
            .merger
            .get(state.cursor)
            .map(|m| m.item.text().to_string());
        (
            state.input.as_string(),
            state.reading,
            state.total,
            state.merger.len(),
            state.selection.len(),
            current,
        )
    }

    /// Extracts the final output after both loops stopped.
    #[must_use]
    pub fn take_output(&self) -> TermOutput {
        let mut state = self.lock();
        let outcome = state.outcome.unwrap_or(Outcome::Abort);
        let query = state.input.as_string();
        let pressed = state.pressed.take();
        let mut selected = state.selection.in_order();
        if selected.is_empty()
            && outcome == Outcome::Accept
            && let Some(current) = state.merger.get(state.cursor)
        {
            selected.push(current.item);
        }
        TermOutput {
            outcome,
            query,
            pressed,
            selected,
        }
    }

    // -----------------------------------------------------------------
    // Input loop
    // -----------------------------------------------------------------

    /// Spawns the input loop over the backend's event stream.
    #[must_use]
    pub fn start_input_loop(self: &Arc<Self>, mut events: Box<dyn EventSource>) -> JoinHandle<()> {
        let terminal = Arc::clone(self);
        std::thread::Builder::new()
            .name("sift-input".to_string())
            .spawn(move || {
                loop {
                    let event = events.get_char();
                    if terminal.handle_event(&event) {
                        break;
                    }
                }
            })
            .unwrap_or_else(|_| std::process::abort())
    }

    /// Processes one input event; returns `true` when the session is
    /// over.
    pub fn handle_event(&self, event: &TermEvent) -> bool {
        if let Some(name) = event_name(event)
            && self.expect.iter().any(|e| e == &name)
        {
            self.lock().pressed = Some(name);
            return self.apply_action(&Action::Accept);
        }
        match event {
            TermEvent::Mouse(mouse) => self.handle_mouse(*mouse),
            TermEvent::Resize => {
                self.request_redraw();
                false
            }
            _ => {
                let action = self.translate(event);
                self.apply_action(&action)
            }
        }
    }

    /// The fixed default keymap.
    fn translate(&self, event: &TermEvent) -> Action {
        let has_history = self.lock().history.is_some();
        match event {
            TermEvent::Rune(c) => Action::Rune(*c),
            TermEvent::Key(key) => match key {
                Key::Enter => Action::Accept,
                Key::Esc | Key::Ctrl('c' | 'g' | 'q') => Action::Abort,
                Key::Ctrl('a') | Key::Home => Action::BeginningOfLine,
                Key::Ctrl('e') | Key::End => Action::EndOfLine,
                Key::Ctrl('b') | Key::Left => Action::BackwardChar,
                Key::Ctrl('f') | Key::Right => Action::ForwardChar,
                Key::Ctrl('h') | Key::Backspace => Action::BackwardDeleteChar,
                Key::Delete | Key::Ctrl('d') => Action::DeleteChar,
                Key::Ctrl('k') => Action::KillLine,
                Key::Ctrl('u') => Action::UnixLineDiscard,
                Key::Ctrl('w') => Action::UnixWordRubout,
                Key::Ctrl('y') => Action::Yank,
                Key::Ctrl('l') => Action::Redraw,
                Key::Ctrl('j') => Action::Down,
                Key::Ctrl('n') => {
                    if has_history {
                        Action::NextHistory
                    } else {
                        Action::Down
                    }
                }
                Key::Ctrl('p') => {
                    if has_history {
                        Action::PreviousHistory
                    } else {
                        Action::Up
                    }
                }
                Key::Up => Action::Up,
                Key::Down => Action::Down,
                Key::PageUp => Action::PageUp,
                Key::PageDown => Action::PageDown,
                Key::Tab => {
                    if self.multi {
                        Action::ToggleDown
                    } else {
                        Action::Ignore
                    }
                }
                Key::BackTab => {
                    if self.multi {
                        Action::ToggleUp
                    } else {
                        Action::Ignore
                    }
                }
                Key::Alt('b') => Action::BackwardWord,
                Key::Alt('f') => Action::ForwardWord,
                _ => Action::Ignore,
            },
            TermEvent::Mouse(_) | TermEvent::Resize => Action::Ignore,
        }
    }

    fn handle_mouse(&self, mouse: MouseEvent) -> bool {
        if mouse.scroll != 0 {
            let action = if mouse.scroll < 0 { Action::Up } else { Action::Down };
            return self.apply_action(&action);
        }
        if mouse.left {
            // Rows grow downwards; the list is anchored to the bottom
            // just above the info and prompt lines.
            let mut state = self.lock();
            let height = usize::from(LAST_HEIGHT.load(std::sync::atomic::Ordering::Relaxed));
            let row = usize::from(mouse.y);
            if height >= 3 && row + 3 <= height {
                let list_row = height - 3 - row;
                let target = state.offset + list_row;
                if target < state.merger.len() {
                    state.cursor = target;
                    drop(state);
                    self.reqbox.set(TermRequest::List, TermPayload::Notify);
                    if mouse.double {
                        return self.apply_action(&Action::Accept);
                    }
                    return false;
                }
            }
        }
        false
    }

    /// Applies one action; returns `true` when the session is over.
    #[allow(clippy::too_many_lines)]
    pub fn apply_action(&self, action: &Action) -> bool {
        let mut state = self.lock();
        let mut query_changed = false;
        let mut list_changed = false;
        match action {
            Action::Ignore => {}
            Action::Rune(c) => {
                state.input.insert(*c);
                query_changed = true;
            }
            Action::Accept => {
                let query = state.input.as_string();
                if let Some(history) = state.history.as_mut() {
                    history.append(&query);
                }
                drop(state);
                self.finish(Outcome::Accept);
                return true;
            }
            Action::Abort => {
                drop(state);
                self.finish(Outcome::Abort);
                return true;
            }
            Action::BeginningOfLine => state.input.move_home(),
            Action::EndOfLine => state.input.move_end(),
            Action::BackwardChar => state.input.move_left(),
            Action::ForwardChar => state.input.move_right(),
            Action::BackwardWord => state.input.move_backward_word(),
            Action::ForwardWord => state.input.move_forward_word(),
            Action::BackwardDeleteChar => query_changed = state.input.delete_backward(),
            Action::DeleteChar => query_changed = state.input.delete_forward(),
            Action::KillLine => query_changed = state.input.kill_line(),
            Action::UnixLineDiscard => query_changed = state.input.discard_line(),
            Action::UnixWordRubout => query_changed = state.input.rubout_word(),
            Action::Yank => query_changed = state.input.yank(),
            Action::ChangeQuery(q) => {
                state.input.set(q);
                query_changed = true;
            }
            Action::ClearQuery => {
                if !state.input.is_empty() {
                    state.input.set("");
                    query_changed = true;
                }
            }
            Action::Up => {
                list_changed = move_cursor(&mut state, 1);
            }
            Action::Down => {
                list_changed = move_cursor(&mut state, -1);
            }
            Action::First => {
                list_changed = state.cursor != 0;
                state.cursor = 0;
                state.offset = 0;
            }
            Action::Last => {
                let last = state.merger.len().saturating_sub(1);
                list_changed = state.cursor != last;
                state.cursor = last;
            }
            Action::PageUp => {
                let page = isize::try_from(last_list_height()).unwrap_or(10);
                list_changed = move_cursor(&mut state, page);
            }
            Action::PageDown => {
                let page = isize::try_from(last_list_height()).unwrap_or(10);
                list_changed = move_cursor(&mut state, -page);
            }
            Action::Toggle => list_changed = self.toggle_current(&mut state),
            Action::ToggleDown => {
                list_changed = self.toggle_current(&mut state);
                move_cursor(&mut state, -1);
            }
            Action::ToggleUp => {
                list_changed = self.toggle_current(&mut state);
                move_cursor(&mut state, 1);
            }
            Action::ToggleAll => {
                if self.multi {
                    for i in 0..state.merger.len() {
                        if let Some(m) = state.merger.get(i) {
                            state.selection.toggle(&m.item);
                        }
                    }
                    list_changed = true;
                }
            }
            Action::SelectAll => {
                if self.multi {
                    for i in 0..state.merger.len() {
                        if let Some(m) = state.merger.get(i) {
                            state.selection.select(&m.item);
                        }
                    }
                    list_changed = true;
                }
            }
            Action::DeselectAll => {
                state.selection.clear();
                list_changed = true;
            }
            Action::PreviousHistory => {
                let current = state.input.as_string();
                if let Some(entry) = state.history.as_mut().and_then(|h| h.previous(&current)) {
                    state.input.set(&entry);
                    query_changed = true;
                }
            }
            Action::NextHistory => {
                if let Some(entry) = state.history.as_mut().and_then(History::next) {
                    state.input.set(&entry);
                    query_changed = true;
                }
            }
            Action::Redraw => {
                drop(state);
                self.request_redraw();
                return false;
            }
        }
        drop(state);

        if query_changed {
            debug!("query changed");
            self.global.set(EventType::SearchNew, CoreEvent::Notify);
            self.reqbox.set(TermRequest::Prompt, TermPayload::Notify);
            self.reqbox.set(TermRequest::Info, TermPayload::Notify);
        } else if matches!(action, Action::Rune(_) | Action::BeginningOfLine | Action::EndOfLine
            | Action::BackwardChar | Action::ForwardChar | Action::BackwardWord | Action::ForwardWord)
        {
            self.reqbox.set(TermRequest::Prompt, TermPayload::Notify);
        }
        if list_changed {
            self.reqbox.set(TermRequest::List, TermPayload::Notify);
            self.reqbox.set(TermRequest::Info, TermPayload::Notify);
        }
        false
    }

    fn toggle_current(&self, state: &mut TermState) -> bool {
        if !self.multi {
            return false;
        }
        let Some(current) = state.merger.get(state.cursor) else {
            return false;
        };
        state.selection.toggle(&current.item);
        true
    }

    fn finish(&self, outcome: Outcome) {
        self.lock().outcome = Some(outcome);
        self.reqbox.set(TermRequest::Close, TermPayload::Notify);
        let code = match outcome {
            Outcome::Accept => EXIT_OK,
            Outcome::Abort => EXIT_INTERRUPT,
            Outcome::NoMatch => EXIT_NO_MATCH,
        };
        self.global.set(EventType::Quit, CoreEvent::Quit(code));
    }

    // -----------------------------------------------------------------
    // Paint loop
    // -----------------------------------------------------------------

    /// Runs the paint loop until close. Call on a dedicated thread.
    pub fn run_paint_loop(&self, screen: &mut dyn Backend) -> Result<(), TerminalError> {
        screen.init()?;
        self.paint(screen, true, true, true, true);
        loop {
            #[derive(Default)]
            struct Batch {
                prompt: bool,
                info: bool,
                list: bool,
                full: bool,
                reinit: bool,
                close: bool,
            }
            let mut batch = Batch::default();
            self.reqbox.wait(|events| {
                for (key, _payload) in events.drain() {
                    match key {
                        TermRequest::Prompt => batch.prompt = true,
                        TermRequest::Info => batch.info = true,
                        TermRequest::List => batch.list = true,
                        TermRequest::Redraw => batch.full = true,
                        TermRequest::Reinit => batch.reinit = true,
                        TermRequest::Close => batch.close = true,
                    }
                }
            });
            if batch.close || self.lock().outcome.is_some() {
                break;
            }
            if batch.reinit {
                screen.close();
                screen.init()?;
                batch.full = true;
            }
            self.paint(
                screen,
                batch.prompt || batch.full,
                batch.info || batch.full,
                batch.list || batch.full,
                batch.full,
            );
        }
        screen.close();
        Ok(())
    }

    /// Repaints the requested panels.
    fn paint(&self, screen: &mut dyn Backend, prompt: bool, info: bool, list: bool, full: bool) {
        let width = usize::from(screen.max_x());
        let height = screen.max_y();
        LAST_HEIGHT.store(height, std::sync::atomic::Ordering::Relaxed);
        if height < 3 {
            return;
        }
        if full {
            screen.clear();
        }
        let state = self.lock();
        if list || full {
            self.paint_list(screen, &state, width, height);
        }
        if info || full {
            paint_info(screen, &state, width, height);
        }
        if prompt || info || list || full {
            self.paint_prompt(screen, &state, width, height);
        }
        drop(state);
        screen.refresh();
    }

    fn paint_prompt(&self, screen: &mut dyn Backend, state: &TermState, width: usize, height: u16) {
        screen.move_to(height - 1, 0);
        screen.cprint(ColorPair::Prompt, true, &self.prompt);
        let query = state.input.as_string();
        let cursor = state.input.cursor();
        let chars: Vec<char> = query.chars().collect();
        let before: String = chars[..cursor].iter().collect();
        let at: String = chars.get(cursor).map_or(" ".to_string(), |c| c.to_string());
        let after: String = chars.get(cursor + 1..).map_or(String::new(), |c| c.iter().collect());
        screen.print(&before);
        screen.cprint(ColorPair::Current, false, &at);
        screen.print(&after);
        let used = self.prompt.chars().count() + chars.len() + 1;
        clear_to_eol(screen, width.saturating_sub(used));
    }

    fn paint_list(&self, screen: &mut dyn Backend, state: &TermState, width: usize, height: u16) {
        let list_height = usize::from(height) - 2;
        for row_index in 0..list_height {
            let Some(row) = (usize::from(height) - 3).checked_sub(row_index) else {
                continue;
            };
            let row = u16::try_from(row).unwrap_or(0);
            screen.move_to(row, 0);
            match state.merger.get(state.offset + row_index) {
                Some(m) => {
                    let current = state.offset + row_index == state.cursor;
                    let selected = state.selection.contains(m.item.index());
                    paint_line(screen, &m, current, selected, width);
                }
                None => clear_to_eol(screen, width),
            }
        }
    }
}

/// Height observed by the last paint, shared with mouse handling.
static LAST_HEIGHT: std::sync::atomic::AtomicU16 = std::sync::atomic::AtomicU16::new(24);

fn last_list_height() -> usize {
    usize::from(LAST_HEIGHT.load(std::sync::atomic::Ordering::Relaxed)).saturating_sub(2)
}

/// Moves the list cursor by `delta` positions (positive moves away
/// from the best match, up the bottom-anchored list) and rescrolls.
fn move_cursor(state: &mut TermState, delta: isize) -> bool {
    let len = state.merger.len();
    if len == 0 {
        return false;
    }
    let cursor = isize::try_from(state.cursor).unwrap_or(0);
    let max = isize::try_from(len - 1).unwrap_or(0);
    let next = (cursor + delta).clamp(0, max);
    let next = usize::try_from(next).unwrap_or(0);
    let changed = next != state.cursor;
    state.cursor = next;
    rescroll(state);
    changed
}

fn clamp_cursor(state: &mut TermState) {
    let len = state.merger.len();
    if len == 0 {
        state.cursor = 0;
        state.offset = 0;
    } else {
        state.cursor = state.cursor.min(len - 1);
        rescroll(state);
    }
}

fn rescroll(state: &mut TermState) {
    let height = last_list_height().max(1);
    if state.cursor < state.offset {
        state.offset = state.cursor;
    } else if state.cursor >= state.offset + height {
        state.offset = state.cursor + 1 - height;
    }
}

fn paint_info(screen: &mut dyn Backend, state: &TermState, width: usize, height: u16) {
    let mut line = format!("  {}/{}", state.merger.len(), state.total);
    if !state.selection.is_empty() {
        line.push_str(&format!(" ({})", state.selection.len()));
    }
    if let Some(fraction) = state.progress {
        let percent = (fraction * 100.0).clamp(0.0, 100.0);
        line.push_str(&format!(" ({percent:.0}%)"));
    }
    if state.reading {
        line.push_str(" ...");
    }
    if let Some(ref failure) = state.failure {
        line.push_str(&format!(" [Command failed: {failure}]"));
    }
    screen.move_to(height - 2, 0);
    screen.cprint(ColorPair::Info, false, &line);
    clear_to_eol(screen, width.saturating_sub(line.chars().count()));
}

/// Paints one list row: pointer, marker, then the text with matched
/// ranges (and producer colors) highlighted, truncated to the panel
/// width.
fn paint_line(screen: &mut dyn Backend, m: &MatchedItem, current: bool, selected: bool, width: usize) {
    if current {
        screen.cprint(ColorPair::Current, true, "> ");
    } else {
        screen.print("  ");
    }
    if selected {
        screen.cprint(ColorPair::Marker, true, ">");
    } else {
        screen.print(" ");
    }

    let budget = width.saturating_sub(4);
    // Highlight offsets map onto the display text only when matching
    // ran against it directly (no --nth projection).
    let offsets: &[(u32, u32)] = if m.item.has_transform() { &[] } else { &m.offsets };
    let mut used = 0usize;
    let mut segment = String::new();
    let mut segment_attr: Option<SegmentAttr> = None;

    for (pos, ch) in m.item.text().chars().enumerate() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width > budget {
            break;
        }
        used += ch_width;
        let pos32 = u32::try_from(pos).unwrap_or(u32::MAX);
        let attr = attr_at(m.item.colors(), offsets, pos32, current);
        if segment_attr != Some(attr) {
            flush_segment(screen, &mut segment, segment_attr);
            segment_attr = Some(attr);
        }
        segment.push(ch);
    }
    flush_segment(screen, &mut segment, segment_attr);
    clear_to_eol(screen, budget.saturating_sub(used));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentAttr {
    Plain { current: bool },
    Matched { current: bool },
    Ansi(AnsiAttr),
}

fn attr_at(
    colors: Option<&[crate::ansi::AnsiOffset]>,
    offsets: &[(u32, u32)],
    pos: u32,
    current: bool,
) -> SegmentAttr {
    if offsets.iter().any(|&(s, e)| pos >= s && pos < e) {
        return SegmentAttr::Matched { current };
    }
    if let Some(colors) = colors
        && let Some(span) = colors.iter().find(|c| pos >= c.start && pos < c.end)
    {
        return SegmentAttr::Ansi(span.attr);
    }
    SegmentAttr::Plain { current }
}

fn flush_segment(screen: &mut dyn Backend, segment: &mut String, attr: Option<SegmentAttr>) {
    if segment.is_empty() {
        return;
    }
    match attr {
        Some(SegmentAttr::Matched { current }) => {
            let pair = if current { ColorPair::CurrentMatch } else { ColorPair::Matched };
            screen.cprint(pair, true, segment);
        }
        Some(SegmentAttr::Ansi(ansi)) => screen.cprint(ColorPair::Ansi(ansi), false, segment),
        Some(SegmentAttr::Plain { current: true }) => {
            screen.cprint(ColorPair::Current, false, segment);
        }
        Some(SegmentAttr::Plain { current: false }) | None => screen.print(segment),
    }
    segment.clear();
}

fn clear_to_eol(screen: &mut dyn Backend, remaining: usize) {
    if remaining > 0 {
        screen.print(&" ".repeat(remaining));
    }
}
