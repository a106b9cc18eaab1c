//! Query parsing and matching.
//!
//! A [`Pattern`] is built once per canonical query string and is
//! immutable afterwards. In extended mode the query splits into *term
//! sets*: whitespace-separated terms, where a bare `|` joins the next
//! term into the current set as a disjunction. Term prefixes/suffixes
//! select the algorithm: `'` forces exact, `^` anchors the start, `$`
//! anchors the end, `^…$` means equality, and `!` inverts (inverted
//! terms use exact semantics). `\ ` escapes a literal space inside a
//! term.

use std::collections::HashMap;
use std::sync::Arc;

use crate::algo::{self, MatchFn, Scratch};
use crate::item::Item;

/// Case-sensitivity mode, resolved per token under `Smart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Case {
    /// Always case-sensitive.
    Respect,
    /// Never case-sensitive.
    Ignore,
    /// Case-sensitive iff the token contains an uppercase code point.
    #[default]
    Smart,
}

/// Algorithm selected for one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermType {
    /// Fuzzy subsequence match.
    Fuzzy,
    /// Exact substring match.
    Exact,
    /// Anchored prefix match.
    Prefix,
    /// Anchored suffix match.
    Suffix,
    /// Whole-string equality.
    Equal,
}

impl TermType {
    fn algo(self) -> MatchFn {
        match self {
            Self::Fuzzy => algo::fuzzy_match_v1,
            Self::Exact => algo::exact_match_naive,
            Self::Prefix => algo::prefix_match,
            Self::Suffix => algo::suffix_match,
            Self::Equal => algo::equal_match,
        }
    }
}

/// One parsed term of an extended-mode query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    typ: TermType,
    inv: bool,
    text: Vec<char>,
    case_sensitive: bool,
    normalize: bool,
    original: String,
}

/// A disjunction of terms; the item must satisfy every set.
pub type TermSet = Vec<Term>;

/// Static configuration shared by all patterns of a session.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    /// Extended-syntax parsing (default) vs. single-term plain mode.
    pub extended: bool,
    /// Plain-mode algorithm: fuzzy unless `--exact`.
    pub fuzzy: bool,
    /// Case-sensitivity rule.
    pub case: Case,
    /// Fold Latin diacritics.
    pub normalize: bool,
    /// Scan direction for unanchored algorithms.
    pub forward: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            extended: true,
            fuzzy: true,
            case: Case::Smart,
            normalize: false,
            forward: true,
        }
    }
}

/// Result of matching one item: accumulated highlight offsets plus the
/// summed score and the extremal offsets feeding the rank tuple.
#[derive(Debug, Clone, Default)]
pub struct PatternMatch {
    /// Matched character ranges within the target text.
    pub offsets: Vec<(u32, u32)>,
    /// Summed oracle score across term sets.
    pub score: i32,
    /// Smallest matched offset.
    pub begin: u32,
    /// Largest matched offset.
    pub end: u32,
}

/// An immutable, matchable query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    extended: bool,
    fuzzy: bool,
    case_sensitive: bool,
    normalize: bool,
    forward: bool,
    query: String,
    text: Vec<char>,
    term_sets: Vec<TermSet>,
    cacheable: bool,
    cache_key: String,
}

impl Pattern {
    /// Builds a pattern from a canonicalized query.
    #[must_use]
    pub fn build(config: &PatternConfig, query: &str) -> Self {
        let query = canonicalize(query);
        if config.extended {
            Self::build_extended(config, query)
        } else {
            Self::build_plain(config, query)
        }
    }

    fn build_plain(config: &PatternConfig, query: String) -> Self {
        let case_sensitive = resolve_case(config.case, &query);
        let text = fold_pattern(&query, case_sensitive, config.normalize);
        let cache_key = query.clone();
        Self {
            extended: false,
            fuzzy: config.fuzzy,
            case_sensitive,
            normalize: config.normalize,
            forward: config.forward,
            query,
            text,
            term_sets: Vec::new(),
            cacheable: true,
            cache_key,
        }
    }

    fn build_extended(config: &PatternConfig, query: String) -> Self {
        let mut term_sets: Vec<TermSet> = Vec::new();
        let mut set: TermSet = Vec::new();
        let mut switch_set = false;

        for token in split_tokens(&query) {
            if token == "|" {
                // The next term joins the current disjunction.
                switch_set = false;
                continue;
            }
            let Some(term) = parse_term(config, &token) else {
                continue;
            };
            if switch_set && !set.is_empty() {
                term_sets.push(std::mem::take(&mut set));
            }
            set.push(term);
            switch_set = true;
        }
        if !set.is_empty() {
            term_sets.push(set);
        }

        let cacheable = term_sets
            .iter()
            .all(|set| set.len() == 1 && !set[0].inv);
        let cache_key = term_sets
            .iter()
            .filter(|set| set.len() == 1 && !set[0].inv)
            .map(|set| set[0].original.as_str())
            .collect::<Vec<_>>()
            .join("\t");

        Self {
            extended: true,
            fuzzy: config.fuzzy,
            case_sensitive: false,
            normalize: config.normalize,
            forward: config.forward,
            query,
            text: Vec::new(),
            term_sets,
            cacheable,
            cache_key,
        }
    }

    /// The canonical query string (the merger-cache key).
    #[must_use]
    pub fn as_string(&self) -> &str {
        &self.query
    }

    /// `true` when the pattern matches every item trivially.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        if self.extended {
            self.term_sets.is_empty()
        } else {
            self.text.is_empty()
        }
    }

    /// `true` iff no term set is inverted or disjunctive, making
    /// per-chunk results reusable across queries.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Projection of the pattern onto its cacheable terms.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Parsed term sets (extended mode).
    #[must_use]
    pub fn term_sets(&self) -> &[TermSet] {
        &self.term_sets
    }

    /// Matches one item, returning offsets and score on success.
    ///
    /// The match target is the item's `--nth` projection when present,
    /// its full text otherwise. Extended evaluation short-circuits on
    /// the first failing term set.
    #[must_use]
    pub fn match_item(&self, item: &Item, scratch: &mut MatchScratch) -> Option<PatternMatch> {
        scratch.chars.clear();
        scratch.chars.extend(item.target().chars());
        if self.extended {
            self.match_extended(&scratch.chars, &mut scratch.algo)
        } else {
            self.match_plain(&scratch.chars, &mut scratch.algo)
        }
    }

    fn match_plain(&self, text: &[char], scratch: &mut Scratch) -> Option<PatternMatch> {
        let algorithm: MatchFn = if self.fuzzy {
            algo::fuzzy_match_v1
        } else {
            algo::exact_match_naive
        };
        let (span, _) = algorithm(
            self.case_sensitive,
            self.normalize,
            self.forward,
            text,
            &self.text,
            false,
            scratch,
        );
        span.map(|s| {
            let begin = u32::try_from(s.start).unwrap_or(u32::MAX);
            let end = u32::try_from(s.end).unwrap_or(u32::MAX);
            PatternMatch {
                offsets: if s.start < s.end { vec![(begin, end)] } else { Vec::new() },
                score: s.score,
                begin,
                end,
            }
        })
    }

    fn match_extended(&self, text: &[char], scratch: &mut Scratch) -> Option<PatternMatch> {
        let mut result = PatternMatch {
            begin: u32::MAX,
            ..PatternMatch::default()
        };
        for set in &self.term_sets {
            let mut matched = false;
            for term in set {
                let (span, _) = term.typ.algo()(
                    term.case_sensitive,
                    term.normalize,
                    self.forward,
                    text,
                    &term.text,
                    false,
                    scratch,
                );
                if term.inv {
                    if span.is_some() {
                        matched = false;
                        break;
                    }
                    // An inverted term that fails to match satisfies
                    // the set, but keeps probing later inverted terms.
                    matched = true;
                } else if let Some(span) = span {
                    let begin = u32::try_from(span.start).unwrap_or(u32::MAX);
                    let end = u32::try_from(span.end).unwrap_or(u32::MAX);
                    if begin < end {
                        result.offsets.push((begin, end));
                    }
                    result.begin = result.begin.min(begin);
                    result.end = result.end.max(end);
                    result.score += span.score;
                    matched = true;
                    break;
                }
            }
            if !matched {
                return None;
            }
        }
        if result.begin == u32::MAX {
            result.begin = 0;
        }
        Some(result)
    }
}

/// Reusable per-worker matching memory: the target's character buffer
/// plus the oracle scratch.
#[derive(Debug, Default)]
pub struct MatchScratch {
    chars: Vec<char>,
    algo: Scratch,
}

/// Memoizing builder: one built [`Pattern`] per canonical query.
///
/// The map lives for as long as the configuration does; changing the
/// grammar or case mode means building a fresh cache.
pub struct PatternCache {
    config: PatternConfig,
    cache: HashMap<String, Arc<Pattern>>,
}

impl PatternCache {
    /// Creates an empty cache for the given configuration.
    #[must_use]
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
        }
    }

    /// Returns the memoized pattern for `query`, building it on first
    /// use.
    pub fn get(&mut self, query: &str) -> Arc<Pattern> {
        let key = canonicalize(query);
        if let Some(hit) = self.cache.get(&key) {
            return Arc::clone(hit);
        }
        let pattern = Arc::new(Pattern::build(&self.config, &key));
        self.cache.insert(key, Arc::clone(&pattern));
        pattern
    }

    /// Drops all memoized patterns.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Trims leading whitespace and unescaped trailing whitespace.
fn canonicalize(query: &str) -> String {
    let s = query.trim_start();
    let mut end = s.len();
    let bytes = s.as_bytes();
    while end > 0 && bytes[end - 1] == b' ' {
        if end >= 2 && bytes[end - 2] == b'\\' {
            break;
        }
        end -= 1;
    }
    s[..end].to_string()
}

/// Splits on whitespace honoring `\ ` escapes; the escape is resolved
/// to a literal space inside the token.
fn split_tokens(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in query.chars() {
        if escaped {
            if ch != ' ' {
                current.push('\\');
            }
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if escaped {
        current.push('\\');
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn resolve_case(case: Case, text: &str) -> bool {
    match case {
        Case::Respect => true,
        Case::Ignore => false,
        Case::Smart => text.chars().any(char::is_uppercase),
    }
}

/// Canonical pattern characters: lowercased when insensitive, folded
/// when normalization applies.
fn fold_pattern(text: &str, case_sensitive: bool, normalize: bool) -> Vec<char> {
    text.chars()
        .map(|c| {
            let c = if normalize { algo::normalize_char(c) } else { c };
            if case_sensitive {
                c
            } else {
                c.to_lowercase().next().unwrap_or(c)
            }
        })
        .collect()
}

fn parse_term(config: &PatternConfig, token: &str) -> Option<Term> {
    let original = token.to_string();
    let mut text = token;
    let mut inv = false;
    let mut typ = if config.fuzzy { TermType::Fuzzy } else { TermType::Exact };

    if let Some(rest) = text.strip_prefix('!') {
        inv = true;
        typ = TermType::Exact;
        text = rest;
    }
    if text != "$"
        && let Some(rest) = text.strip_suffix('$')
    {
        typ = TermType::Suffix;
        text = rest;
    }
    if let Some(rest) = text.strip_prefix('\'') {
        // A quote forces exact in fuzzy mode and releases back to
        // fuzzy in exact mode.
        typ = if config.fuzzy && !inv { TermType::Exact } else { TermType::Fuzzy };
        text = rest;
    } else if let Some(rest) = text.strip_prefix('^') {
        typ = if typ == TermType::Suffix { TermType::Equal } else { TermType::Prefix };
        text = rest;
    }
    if text.is_empty() {
        return None;
    }

    let case_sensitive = resolve_case(config.case, text);
    // Accented pattern characters disable folding so the user can
    // match diacritics literally.
    let normalize = config.normalize
        && text.chars().all(|c| algo::normalize_char(c) == c);
    Some(Term {
        typ,
        inv,
        text: fold_pattern(text, case_sensitive, normalize),
        case_sensitive,
        normalize,
        original,
    })
}
