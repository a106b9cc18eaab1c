//! Query history persistence (`--history`).
//!
//! History I/O is non-fatal by design: a missing or unwritable file
//! degrades to an empty in-memory history and the session runs without
//! persistence.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

/// Default cap on persisted history entries.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// A navigable, file-backed query history.
pub struct History {
    path: PathBuf,
    lines: Vec<String>,
    max_size: usize,
    /// Navigation cursor: `lines.len()` means "past the newest entry",
    /// i.e. the live query.
    cursor: usize,
    /// The in-progress query stashed when navigation starts.
    stashed: Option<String>,
}

impl History {
    /// Loads history from `path`, tolerating a missing file.
    #[must_use]
    pub fn load(path: PathBuf, max_size: usize) -> Self {
        let lines: Vec<String> = match fs::read_to_string(&path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "history load failed");
                }
                Vec::new()
            }
        };
        let cursor = lines.len();
        Self {
            path,
            lines,
            max_size,
            cursor,
            stashed: None,
        }
    }

    /// Appends an accepted query and rewrites the file, dropping empty
    /// queries and consecutive duplicates, capped at `max_size`.
    pub fn append(&mut self, query: &str) {
        if query.is_empty() || self.lines.last().is_some_and(|last| last == query) {
            return;
        }
        self.lines.push(query.to_string());
        if self.lines.len() > self.max_size {
            let excess = self.lines.len() - self.max_size;
            self.lines.drain(..excess);
        }
        self.cursor = self.lines.len();
        self.stashed = None;
        if let Err(e) = self.write_file() {
            warn!(path = %self.path.display(), error = %e, "history write failed");
        }
    }

    fn write_file(&self) -> std::io::Result<()> {
        let mut file = fs::File::create(&self.path)?;
        for line in &self.lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Steps to the previous (older) entry, stashing the live query on
    /// first navigation. Returns the query to display.
    pub fn previous(&mut self, current: &str) -> Option<String> {
        if self.lines.is_empty() || self.cursor == 0 {
            return None;
        }
        if self.cursor == self.lines.len() {
            self.stashed = Some(current.to_string());
        }
        self.cursor -= 1;
        self.lines.get(self.cursor).cloned()
    }

    /// Steps to the next (newer) entry; past the newest entry the
    /// stashed live query comes back.
    pub fn next(&mut self) -> Option<String> {
        if self.cursor >= self.lines.len() {
            return None;
        }
        self.cursor += 1;
        if self.cursor == self.lines.len() {
            return Some(self.stashed.take().unwrap_or_default());
        }
        self.lines.get(self.cursor).cloned()
    }

    /// Number of persisted entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// `true` when no entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
