//! Match algorithms: the scoring oracle behind [`crate::pattern`].
//!
//! One function per match type, all sharing the same shape:
//! `(case_sensitive, normalize, forward, text, pattern, want_positions,
//! scratch) -> (Option<MatchSpan>, Option<Vec<usize>>)`. All functions
//! are pure and reentrant; the caller passes a per-worker [`Scratch`]
//! buffer so the hot path does not allocate.
//!
//! Scoring follows the classic two-pass scheme: a forward scan finds
//! the earliest end of a subsequence match, a backward scan shrinks it
//! to the tightest start, then the span is rescored with positional
//! bonuses (word boundaries, camelCase transitions, consecutive runs).

/// Score awarded per matched character.
pub const SCORE_MATCH: i32 = 16;
/// Penalty for opening a gap between matched characters.
pub const SCORE_GAP_START: i32 = -3;
/// Penalty for extending an open gap.
pub const SCORE_GAP_EXTENSION: i32 = -1;
/// Bonus for a match right after a non-word character.
pub const BONUS_BOUNDARY: i32 = SCORE_MATCH / 2;
/// Bonus for matching a non-word character itself.
pub const BONUS_NON_WORD: i32 = SCORE_MATCH / 2;
/// Bonus for a camelCase or letter-to-digit transition.
pub const BONUS_CAMEL: i32 = BONUS_BOUNDARY - 1;
/// Bonus for each consecutive matched character after the first.
pub const BONUS_CONSECUTIVE: i32 = -(SCORE_GAP_START + SCORE_GAP_EXTENSION);
/// Multiplier applied to the bonus of the first matched character.
pub const BONUS_FIRST_CHAR_MULTIPLIER: i32 = 2;

/// A matched span: half-open character range plus its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    /// First matched character index.
    pub start: usize,
    /// One past the last matched character index.
    pub end: usize,
    /// Computed score of the span.
    pub score: i32,
}

/// Reusable per-worker working memory.
#[derive(Debug, Default)]
pub struct Scratch {
    occurrences: Vec<usize>,
}

/// Result pair returned by every algorithm.
pub type AlgoResult = (Option<MatchSpan>, Option<Vec<usize>>);

/// Signature shared by all match algorithms.
pub type MatchFn =
    fn(bool, bool, bool, &[char], &[char], bool, &mut Scratch) -> AlgoResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    NonWord,
    Lower,
    Upper,
    Number,
}

fn class_of(c: char) -> CharClass {
    if c.is_lowercase() {
        CharClass::Lower
    } else if c.is_uppercase() {
        CharClass::Upper
    } else if c.is_ascii_digit() {
        CharClass::Number
    } else {
        CharClass::NonWord
    }
}

const fn bonus_for(prev: CharClass, current: CharClass) -> i32 {
    match (prev, current) {
        (CharClass::NonWord, CharClass::Lower | CharClass::Upper | CharClass::Number) => {
            BONUS_BOUNDARY
        }
        (CharClass::Lower, CharClass::Upper)
        | (CharClass::Lower | CharClass::Upper | CharClass::NonWord, CharClass::Number) => {
            BONUS_CAMEL
        }
        (_, CharClass::NonWord) => BONUS_NON_WORD,
        _ => 0,
    }
}

/// Folds a Latin character to its unaccented base form.
#[must_use]
pub const fn normalize_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' | 'ĉ' => 'c',
        'ď' | 'đ' => 'd',
        'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' | 'ģ' | 'ĝ' => 'g',
        'í' | 'ì' | 'î' | 'ï' | 'ī' | 'į' => 'i',
        'ł' | 'ļ' | 'ĺ' => 'l',
        'ñ' | 'ń' | 'ň' | 'ņ' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ō' => 'o',
        'ŕ' | 'ř' => 'r',
        'ś' | 'š' | 'ş' | 'ŝ' => 's',
        'ť' | 'ţ' => 't',
        'ú' | 'ù' | 'û' | 'ü' | 'ū' | 'ů' | 'ų' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ž' | 'ż' => 'z',
        _ => c,
    }
}

/// Transforms one text character for comparison under the given flags.
fn fold(c: char, case_sensitive: bool, normalize: bool) -> char {
    let c = if normalize { normalize_char(c) } else { c };
    if case_sensitive {
        c
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

/// Rescores `text[start..end]` against `pattern`, optionally collecting
/// matched positions.
fn calculate_score(
    case_sensitive: bool,
    normalize: bool,
    text: &[char],
    pattern: &[char],
    start: usize,
    end: usize,
    want_positions: bool,
) -> (i32, Option<Vec<usize>>) {
    let mut positions = want_positions.then(|| Vec::with_capacity(pattern.len()));
    let mut pidx = 0;
    let mut score = 0i32;
    let mut in_gap = false;
    let mut consecutive = 0u32;
    let mut first_bonus = 0i32;
    let mut prev_class = if start > 0 {
        class_of(text[start - 1])
    } else {
        CharClass::NonWord
    };

    for (idx, &raw) in text.iter().enumerate().take(end).skip(start) {
        let class = class_of(raw);
        let c = fold(raw, case_sensitive, normalize);
        if pidx < pattern.len() && c == pattern[pidx] {
            if let Some(pos) = positions.as_mut() {
                pos.push(idx);
            }
            score += SCORE_MATCH;
            let mut bonus = bonus_for(prev_class, class);
            if consecutive == 0 {
                first_bonus = bonus;
            } else {
                if bonus == BONUS_BOUNDARY {
                    first_bonus = bonus;
                }
                bonus = bonus.max(first_bonus).max(BONUS_CONSECUTIVE);
            }
            score += if pidx == 0 {
                bonus * BONUS_FIRST_CHAR_MULTIPLIER
            } else {
                bonus
            };
            in_gap = false;
            consecutive += 1;
            pidx += 1;
        } else {
            score += if in_gap { SCORE_GAP_EXTENSION } else { SCORE_GAP_START };
            in_gap = true;
            consecutive = 0;
            first_bonus = 0;
        }
        prev_class = class;
    }
    (score, positions)
}

/// Fuzzy subsequence match.
///
/// Forward scan locates the earliest end of a complete subsequence;
/// a backward scan then shrinks the window to the tightest start, so
/// `oBz` against `fooBarbaz` yields the span `(2, 9)` rather than
/// `(1, 9)`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn fuzzy_match_v1(
    case_sensitive: bool,
    normalize: bool,
    forward: bool,
    text: &[char],
    pattern: &[char],
    want_positions: bool,
    _scratch: &mut Scratch,
) -> AlgoResult {
    if pattern.is_empty() {
        return (
            Some(MatchSpan {
                start: 0,
                end: 0,
                score: 0,
            }),
            want_positions.then(Vec::new),
        );
    }

    let len = text.len();
    // Index order honoring the scan direction.
    let at = |i: usize| -> usize { if forward { i } else { len - 1 - i } };

    let mut pidx = 0;
    let mut start = None;
    let mut end = 0;
    for i in 0..len {
        let c = fold(text[at(i)], case_sensitive, normalize);
        let p = if forward {
            pattern[pidx]
        } else {
            pattern[pattern.len() - 1 - pidx]
        };
        if c == p {
            if start.is_none() {
                start = Some(i);
            }
            pidx += 1;
            if pidx == pattern.len() {
                end = i + 1;
                break;
            }
        }
    }
    if pidx < pattern.len() {
        return (None, None);
    }
    let loose_start = match start {
        Some(s) => s,
        None => return (None, None),
    };

    // Backward pass: walk from the end of the loose window towards its
    // start, consuming the pattern in reverse to find the tight start.
    let mut pidx = pattern.len();
    let mut tight_start = loose_start;
    for i in (loose_start..end).rev() {
        let c = fold(text[at(i)], case_sensitive, normalize);
        let p = if forward {
            pattern[pidx - 1]
        } else {
            pattern[pattern.len() - pidx]
        };
        if c == p {
            pidx -= 1;
            if pidx == 0 {
                tight_start = i;
                break;
            }
        }
    }

    let (sidx, eidx) = if forward {
        (tight_start, end)
    } else {
        (len - end, len - tight_start)
    };
    let (score, positions) = calculate_score(
        case_sensitive,
        normalize,
        text,
        pattern,
        sidx,
        eidx,
        want_positions,
    );
    (
        Some(MatchSpan {
            start: sidx,
            end: eidx,
            score,
        }),
        positions,
    )
}

/// Exact substring match.
///
/// Scans every occurrence and keeps the one whose first character has
/// the best boundary bonus (ties broken towards the scan direction),
/// so `bar` prefers ` bar` over `foobar`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn exact_match_naive(
    case_sensitive: bool,
    normalize: bool,
    forward: bool,
    text: &[char],
    pattern: &[char],
    want_positions: bool,
    scratch: &mut Scratch,
) -> AlgoResult {
    if pattern.is_empty() {
        return (
            Some(MatchSpan {
                start: 0,
                end: 0,
                score: 0,
            }),
            want_positions.then(Vec::new),
        );
    }
    if text.len() < pattern.len() {
        return (None, None);
    }

    scratch.occurrences.clear();
    for start in 0..=(text.len() - pattern.len()) {
        let found = pattern
            .iter()
            .enumerate()
            .all(|(i, &p)| fold(text[start + i], case_sensitive, normalize) == p);
        if found {
            scratch.occurrences.push(start);
        }
    }
    if scratch.occurrences.is_empty() {
        return (None, None);
    }

    let mut best = scratch.occurrences[0];
    let mut best_bonus = i32::MIN;
    let candidates: Box<dyn Iterator<Item = usize>> = if forward {
        Box::new(scratch.occurrences.iter().copied())
    } else {
        Box::new(scratch.occurrences.iter().rev().copied())
    };
    for start in candidates {
        let prev = if start > 0 {
            class_of(text[start - 1])
        } else {
            CharClass::NonWord
        };
        let bonus = bonus_for(prev, class_of(text[start]));
        if bonus > best_bonus {
            best_bonus = bonus;
            best = start;
        }
    }

    let end = best + pattern.len();
    let (score, positions) = calculate_score(
        case_sensitive,
        normalize,
        text,
        pattern,
        best,
        end,
        want_positions,
    );
    (
        Some(MatchSpan {
            start: best,
            end,
            score,
        }),
        positions,
    )
}

/// Anchored prefix match. Leading whitespace of the text is skipped
/// unless the pattern itself starts with whitespace.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn prefix_match(
    case_sensitive: bool,
    normalize: bool,
    _forward: bool,
    text: &[char],
    pattern: &[char],
    want_positions: bool,
    _scratch: &mut Scratch,
) -> AlgoResult {
    if pattern.is_empty() {
        return (
            Some(MatchSpan {
                start: 0,
                end: 0,
                score: 0,
            }),
            want_positions.then(Vec::new),
        );
    }
    let skip = if pattern[0].is_whitespace() {
        0
    } else {
        text.iter().take_while(|c| c.is_whitespace()).count()
    };
    if text.len() - skip < pattern.len() {
        return (None, None);
    }
    for (i, &p) in pattern.iter().enumerate() {
        if fold(text[skip + i], case_sensitive, normalize) != p {
            return (None, None);
        }
    }
    let end = skip + pattern.len();
    let (score, positions) =
        calculate_score(case_sensitive, normalize, text, pattern, skip, end, want_positions);
    (
        Some(MatchSpan {
            start: skip,
            end,
            score,
        }),
        positions,
    )
}

/// Anchored suffix match. Trailing whitespace of the text is skipped
/// unless the pattern itself ends with whitespace.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn suffix_match(
    case_sensitive: bool,
    normalize: bool,
    _forward: bool,
    text: &[char],
    pattern: &[char],
    want_positions: bool,
    _scratch: &mut Scratch,
) -> AlgoResult {
    let trail = if pattern.last().is_some_and(|c| c.is_whitespace()) {
        0
    } else {
        text.iter().rev().take_while(|c| c.is_whitespace()).count()
    };
    let trimmed = text.len() - trail;
    if pattern.is_empty() {
        return (
            Some(MatchSpan {
                start: trimmed,
                end: trimmed,
                score: 0,
            }),
            want_positions.then(Vec::new),
        );
    }
    if trimmed < pattern.len() {
        return (None, None);
    }
    let start = trimmed - pattern.len();
    for (i, &p) in pattern.iter().enumerate() {
        if fold(text[start + i], case_sensitive, normalize) != p {
            return (None, None);
        }
    }
    let (score, positions) = calculate_score(
        case_sensitive,
        normalize,
        text,
        pattern,
        start,
        trimmed,
        want_positions,
    );
    (
        Some(MatchSpan {
            start,
            end: trimmed,
            score,
        }),
        positions,
    )
}

/// Whole-string equality (the `^…$` form), modulo the same whitespace
/// trimming rules as prefix/suffix.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn equal_match(
    case_sensitive: bool,
    normalize: bool,
    _forward: bool,
    text: &[char],
    pattern: &[char],
    want_positions: bool,
    _scratch: &mut Scratch,
) -> AlgoResult {
    if pattern.is_empty() {
        return (None, None);
    }
    let skip = if pattern[0].is_whitespace() {
        0
    } else {
        text.iter().take_while(|c| c.is_whitespace()).count()
    };
    let trail = if pattern.last().is_some_and(|c| c.is_whitespace()) {
        0
    } else {
        text.iter().rev().take_while(|c| c.is_whitespace()).count()
    };
    let end = text.len() - trail;
    if end.saturating_sub(skip) != pattern.len() {
        return (None, None);
    }
    for (i, &p) in pattern.iter().enumerate() {
        if fold(text[skip + i], case_sensitive, normalize) != p {
            return (None, None);
        }
    }
    let (score, positions) =
        calculate_score(case_sensitive, normalize, text, pattern, skip, end, want_positions);
    (
        Some(MatchSpan {
            start: skip,
            end,
            score,
        }),
        positions,
    )
}
