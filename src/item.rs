//! Items and ranked match results.
//!
//! An [`Item`] is created once when a line is read and never mutated:
//! every other structure (snapshots, mergers, caches, the selection
//! set) shares it through an `Arc`. A [`MatchedItem`] pairs an item
//! with its rank tuple and highlight offsets for one matcher pass.

use std::sync::Arc;

use crate::ansi::{AnsiOffset, AnsiState, extract_color};
use crate::error::OptionsError;
use crate::field::{Delimiter, FieldRange, tokenize, transform};

/// One input record with its assigned read-order index.
#[derive(Debug, Clone)]
pub struct Item {
    text: Box<str>,
    transformed: Option<Box<str>>,
    index: u32,
    colors: Option<Vec<AnsiOffset>>,
}

impl Item {
    /// The display text of the item.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text the pattern matches against: the `--nth` transformation
    /// when configured, the display text otherwise.
    #[must_use]
    pub fn target(&self) -> &str {
        self.transformed.as_deref().unwrap_or(&self.text)
    }

    /// Returns `true` when matching runs against a `--nth` projection
    /// instead of the display text (highlight offsets then do not map
    /// onto the display text).
    #[must_use]
    pub const fn has_transform(&self) -> bool {
        self.transformed.is_some()
    }

    /// Dense monotonic index assigned in read order.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Color offsets recovered from stripped ANSI escapes, if any.
    #[must_use]
    pub fn colors(&self) -> Option<&[AnsiOffset]> {
        self.colors.as_deref()
    }
}

/// Builds [`Item`]s from raw producer records.
///
/// Carries the pieces of configuration that shape an item (`--ansi`,
/// `--nth`, `--with-nth`, `--delimiter`) plus the cross-line ANSI
/// state.
#[derive(Debug, Default)]
pub struct ItemBuilder {
    ansi: bool,
    delimiter: Delimiter,
    nth: Vec<FieldRange>,
    with_nth: Vec<FieldRange>,
    ansi_state: AnsiState,
}

impl ItemBuilder {
    /// Creates a builder for plain pass-through items.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables ANSI escape extraction (`--ansi`).
    #[must_use]
    pub const fn ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Sets the field delimiter used by `--nth` / `--with-nth`.
    #[must_use]
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Restricts matching to the given fields (`--nth`).
    #[must_use]
    pub fn nth(mut self, ranges: Vec<FieldRange>) -> Self {
        self.nth = ranges;
        self
    }

    /// Restricts display to the given fields (`--with-nth`).
    #[must_use]
    pub fn with_nth(mut self, ranges: Vec<FieldRange>) -> Self {
        self.with_nth = ranges;
        self
    }

    /// Builds the item for one record, or `None` when the record is
    /// rejected (nothing survives the display transformation).
    pub fn build(&mut self, bytes: &[u8], index: u32) -> Option<Item> {
        let raw = String::from_utf8_lossy(bytes);
        let (mut text, colors) = if self.ansi {
            let (stripped, offsets) = extract_color(&raw, &mut self.ansi_state);
            (stripped, offsets)
        } else {
            (raw.into_owned(), None)
        };

        let needs_tokens = !self.nth.is_empty() || !self.with_nth.is_empty();
        let mut transformed = None;
        if needs_tokens {
            let tokens = tokenize(&text, &self.delimiter);
            if !self.nth.is_empty() {
                transformed = transform(&tokens, &self.nth).map(String::into_boxed_str);
            }
            if !self.with_nth.is_empty() {
                match transform(&tokens, &self.with_nth) {
                    Some(display) => text = display,
                    None => return None,
                }
            }
        }

        Some(Item {
            text: text.into_boxed_str(),
            transformed,
            index,
            colors,
        })
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Sort key of a match: compared lexicographically, smaller is better.
///
/// Slot 0 is the negated oracle score; the middle slots hold the
/// configured tie-breakers; the last slot is always the item index
/// (negated under `--tac`).
pub type Rank = [i32; 5];

/// Tie-break criteria selectable via `--tiebreak`, applied in the
/// configured order after the primary score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankCriteria {
    /// Oracle score, descending.
    Score,
    /// Target length, ascending.
    Length,
    /// Match begin offset, ascending.
    Begin,
    /// Match end offset, ascending.
    End,
    /// Read-order index.
    Index,
}

impl RankCriteria {
    /// Parses one criterion name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, OptionsError> {
        match s.to_lowercase().as_str() {
            "score" => Ok(Self::Score),
            "length" => Ok(Self::Length),
            "begin" => Ok(Self::Begin),
            "end" => Ok(Self::End),
            "index" => Ok(Self::Index),
            other => Err(OptionsError::Tiebreak(other.to_string())),
        }
    }

    /// Parses the comma-separated `--tiebreak` list, rejecting
    /// duplicates and more criteria than rank slots.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, OptionsError> {
        let mut criteria = Vec::new();
        for part in s.split(',') {
            let criterion = Self::parse(part.trim())?;
            if criteria.contains(&criterion) {
                return Err(OptionsError::DuplicateTiebreak(part.trim().to_string()));
            }
            criteria.push(criterion);
        }
        if criteria.len() > 4 {
            return Err(OptionsError::Tiebreak(s.to_string()));
        }
        Ok(criteria)
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Length => "length",
            Self::Begin => "begin",
            Self::End => "end",
            Self::Index => "index",
        }
    }
}

impl std::fmt::Display for RankCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to rank construction for one matched item.
#[derive(Debug, Clone, Copy)]
pub struct RankInput {
    /// Oracle score.
    pub score: i32,
    /// First matched character offset in the target.
    pub begin: i32,
    /// One past the last matched character offset.
    pub end: i32,
    /// Target length in characters.
    pub length: i32,
    /// Item index.
    pub index: u32,
}

/// Builds the rank tuple for the configured criteria.
///
/// `tac` flips the index component so later items sort first.
#[must_use]
pub fn build_rank(input: &RankInput, criteria: &[RankCriteria], tac: bool) -> Rank {
    let index_component = {
        let idx = i32::try_from(input.index).unwrap_or(i32::MAX);
        if tac { -idx } else { idx }
    };
    let mut rank: Rank = [0; 5];
    let mut slot = 0;
    for criterion in criteria.iter().take(4) {
        rank[slot] = match criterion {
            RankCriteria::Score => -input.score,
            RankCriteria::Length => input.length,
            RankCriteria::Begin => input.begin,
            RankCriteria::End => input.end,
            RankCriteria::Index => index_component,
        };
        slot += 1;
    }
    rank[4] = index_component;
    rank
}

/// One item paired with its rank and highlight offsets for a single
/// matcher pass.
#[derive(Debug, Clone)]
pub struct MatchedItem {
    /// The matched item.
    pub item: Arc<Item>,
    /// Sort key; smaller ranks order first.
    pub rank: Rank,
    /// Matched character ranges within the target text.
    pub offsets: Vec<(u32, u32)>,
}

impl MatchedItem {
    /// Pairs `item` with a zero rank and no offsets (used when sorting
    /// is disabled and every item matches trivially).
    #[must_use]
    pub fn unranked(item: Arc<Item>) -> Self {
        Self {
            item,
            rank: [0; 5],
            offsets: Vec::new(),
        }
    }
}

impl PartialEq for MatchedItem {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.item.index() == other.item.index()
    }
}

impl Eq for MatchedItem {}

impl PartialOrd for MatchedItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchedItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.item.index().cmp(&other.item.index()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_builder_plain_item() {
        let mut builder = ItemBuilder::new();
        let item = builder.build(b"hello world", 3).unwrap_or_else(|| panic!("rejected"));
        assert_eq!(item.text(), "hello world");
        assert_eq!(item.target(), "hello world");
        assert_eq!(item.index(), 3);
        assert!(item.colors().is_none());
    }

    #[test]
    fn test_builder_ansi_strips_and_records() {
        let mut builder = ItemBuilder::new().ansi(true);
        let item = builder
            .build(b"\x1b[31mred\x1b[0m plain", 0)
            .unwrap_or_else(|| panic!("rejected"));
        assert_eq!(item.text(), "red plain");
        let colors = item.colors().unwrap_or_default();
        assert_eq!((colors[0].start, colors[0].end), (0, 3));
    }

    #[test]
    fn test_builder_nth_sets_target() {
        let ranges = FieldRange::parse_list("2").unwrap_or_default();
        let mut builder = ItemBuilder::new().nth(ranges);
        let item = builder.build(b"alpha beta gamma", 0).unwrap_or_else(|| panic!("rejected"));
        assert_eq!(item.text(), "alpha beta gamma");
        assert_eq!(item.target(), "beta ");
        assert!(item.has_transform());
    }

    #[test]
    fn test_builder_with_nth_rewrites_display() {
        let ranges = FieldRange::parse_list("1").unwrap_or_default();
        let mut builder = ItemBuilder::new().with_nth(ranges);
        let item = builder.build(b"keep drop", 0).unwrap_or_else(|| panic!("rejected"));
        assert_eq!(item.text(), "keep ");
    }

    #[test]
    fn test_builder_rejects_empty_display() {
        let ranges = FieldRange::parse_list("5").unwrap_or_default();
        let mut builder = ItemBuilder::new().with_nth(ranges);
        assert!(builder.build(b"one two", 0).is_none());
    }

    #[test_case("score", RankCriteria::Score; "score")]
    #[test_case("LENGTH", RankCriteria::Length; "length upper")]
    #[test_case("Begin", RankCriteria::Begin; "begin mixed")]
    fn test_criteria_parse(input: &str, expected: RankCriteria) {
        assert_eq!(
            RankCriteria::parse(input).unwrap_or(RankCriteria::Index),
            expected
        );
    }

    #[test]
    fn test_criteria_parse_list_rejects_duplicates() {
        assert!(RankCriteria::parse_list("score,score").is_err());
        assert!(RankCriteria::parse_list("speed").is_err());
        let ok = RankCriteria::parse_list("score, length").unwrap_or_default();
        assert_eq!(ok, vec![RankCriteria::Score, RankCriteria::Length]);
    }

    #[test]
    fn test_rank_orders_by_score_then_index() {
        let criteria = vec![RankCriteria::Score];
        let high = build_rank(
            &RankInput { score: 50, begin: 0, end: 3, length: 10, index: 7 },
            &criteria,
            false,
        );
        let low = build_rank(
            &RankInput { score: 10, begin: 0, end: 3, length: 10, index: 2 },
            &criteria,
            false,
        );
        assert!(high < low);
    }

    #[test]
    fn test_rank_tac_flips_index() {
        let criteria = vec![RankCriteria::Score];
        let early = build_rank(
            &RankInput { score: 10, begin: 0, end: 1, length: 5, index: 1 },
            &criteria,
            true,
        );
        let late = build_rank(
            &RankInput { score: 10, begin: 0, end: 1, length: 5, index: 9 },
            &criteria,
            true,
        );
        assert!(late < early);
    }

    #[test]
    fn test_matched_item_ordering_is_total() {
        let mut builder = ItemBuilder::new();
        let a = Arc::new(builder.build(b"a", 0).unwrap_or_else(|| panic!("rejected")));
        let b = Arc::new(builder.build(b"b", 1).unwrap_or_else(|| panic!("rejected")));
        let ma = MatchedItem { item: a, rank: [0, 0, 0, 0, 0], offsets: vec![] };
        let mb = MatchedItem { item: b, rank: [0, 0, 0, 0, 1], offsets: vec![] };
        assert!(ma < mb);
    }
}
