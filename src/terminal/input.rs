//! The query input buffer: an ordered sequence of runes plus a cursor,
//! with emacs-style editing operations. Word motions follow Unicode
//! word boundaries.

use unicode_segmentation::UnicodeSegmentation;

/// Editable query line.
#[derive(Debug, Default, Clone)]
pub struct QueryBuffer {
    chars: Vec<char>,
    cursor: usize,
    yanked: Vec<char>,
}

impl QueryBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer pre-filled with `initial`, cursor at the end.
    #[must_use]
    pub fn with_query(initial: &str) -> Self {
        let chars: Vec<char> = initial.chars().collect();
        let cursor = chars.len();
        Self {
            chars,
            cursor,
            yanked: Vec::new(),
        }
    }

    /// The query text.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Cursor position in characters.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// `true` when the query is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Replaces the whole query, cursor at the end.
    pub fn set(&mut self, query: &str) {
        self.chars = query.chars().collect();
        self.cursor = self.chars.len();
    }

    /// Inserts a rune at the cursor.
    pub fn insert(&mut self, c: char) {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    /// Deletes the rune before the cursor. Returns `true` on change.
    pub fn delete_backward(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    /// Deletes the rune under the cursor. Returns `true` on change.
    pub fn delete_forward(&mut self) -> bool {
        if self.cursor >= self.chars.len() {
            return false;
        }
        self.chars.remove(self.cursor);
        true
    }

    /// Moves one rune left.
    pub const fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    /// Moves one rune right.
    pub fn move_right(&mut self) {
        if self.cursor < self.chars.len() {
            self.cursor += 1;
        }
    }

    /// Moves to the start of the line.
    pub const fn move_home(&mut self) {
        self.cursor = 0;
    }

    /// Moves past the last rune.
    pub fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// Moves to the previous word boundary.
    pub fn move_backward_word(&mut self) {
        self.cursor = self.prev_word_boundary();
    }

    /// Moves to the next word boundary.
    pub fn move_forward_word(&mut self) {
        self.cursor = self.next_word_boundary();
    }

    /// Deletes from the cursor to the end of line into the yank
    /// buffer. Returns `true` on change.
    pub fn kill_line(&mut self) -> bool {
        if self.cursor >= self.chars.len() {
            return false;
        }
        self.yanked = self.chars.split_off(self.cursor);
        true
    }

    /// Deletes the whole line before the cursor into the yank buffer.
    /// Returns `true` on change.
    pub fn discard_line(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let rest = self.chars.split_off(self.cursor);
        self.yanked = std::mem::replace(&mut self.chars, rest);
        self.cursor = 0;
        true
    }

    /// Deletes the word before the cursor into the yank buffer.
    /// Returns `true` on change.
    pub fn rubout_word(&mut self) -> bool {
        let boundary = self.prev_word_boundary();
        if boundary == self.cursor {
            return false;
        }
        self.yanked = self.chars.drain(boundary..self.cursor).collect();
        self.cursor = boundary;
        true
    }

    /// Inserts the yank buffer at the cursor. Returns `true` on change.
    pub fn yank(&mut self) -> bool {
        if self.yanked.is_empty() {
            return false;
        }
        let yanked = self.yanked.clone();
        for c in yanked {
            self.insert(c);
        }
        true
    }

    /// Character offset of the word boundary before the cursor.
    fn prev_word_boundary(&self) -> usize {
        let text: String = self.chars[..self.cursor].iter().collect();
        let mut boundary = 0;
        for (byte_idx, word) in text.unicode_word_indices() {
            let start = text[..byte_idx].chars().count();
            let end = start + word.chars().count();
            if end < self.cursor {
                boundary = start;
            } else {
                return start;
            }
        }
        boundary
    }

    /// Character offset of the word boundary after the cursor.
    fn next_word_boundary(&self) -> usize {
        let text: String = self.chars.iter().collect();
        for (byte_idx, word) in text.unicode_word_indices() {
            let start = text[..byte_idx].chars().count();
            let end = start + word.chars().count();
            if end > self.cursor {
                return end;
            }
        }
        self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(s: &str) -> QueryBuffer {
        QueryBuffer::with_query(s)
    }

    #[test]
    fn test_insert_and_delete() {
        let mut q = QueryBuffer::new();
        q.insert('a');
        q.insert('b');
        q.move_left();
        q.insert('x');
        assert_eq!(q.as_string(), "axb");
        assert!(q.delete_backward());
        assert_eq!(q.as_string(), "ab");
        assert!(q.delete_forward());
        assert_eq!(q.as_string(), "a");
        assert!(!q.delete_forward());
    }

    #[test]
    fn test_home_end_motion() {
        let mut q = buffer("hello");
        q.move_home();
        assert_eq!(q.cursor(), 0);
        q.move_end();
        assert_eq!(q.cursor(), 5);
    }

    #[test]
    fn test_kill_and_yank() {
        let mut q = buffer("hello world");
        q.move_home();
        q.move_forward_word();
        assert!(q.kill_line());
        assert_eq!(q.as_string(), "hello");
        q.move_end();
        assert!(q.yank());
        assert_eq!(q.as_string(), "hello world");
    }

    #[test]
    fn test_discard_line() {
        let mut q = buffer("keep this");
        q.move_backward_word();
        assert!(q.discard_line());
        assert_eq!(q.as_string(), "this");
        assert_eq!(q.cursor(), 0);
    }

    #[test]
    fn test_rubout_word() {
        let mut q = buffer("foo bar baz");
        assert!(q.rubout_word());
        assert_eq!(q.as_string(), "foo bar ");
        assert!(q.rubout_word());
        assert_eq!(q.as_string(), "foo ");
    }

    #[test]
    fn test_word_motion_unicode() {
        let mut q = buffer("héllo wörld");
        q.move_home();
        q.move_forward_word();
        assert_eq!(q.cursor(), 5);
        q.move_forward_word();
        assert_eq!(q.cursor(), 11);
        q.move_backward_word();
        assert_eq!(q.cursor(), 6);
    }

    #[test]
    fn test_set_replaces() {
        let mut q = buffer("old");
        q.set("brand new");
        assert_eq!(q.as_string(), "brand new");
        assert_eq!(q.cursor(), 9);
    }
}
