//! Field tokenization for `--nth` / `--with-nth`.
//!
//! Splits a line into tokens (AWK-style when no delimiter is given:
//! each token keeps its trailing whitespace, so joining tokens
//! reproduces the original line) and resolves field-range expressions
//! such as `1`, `-1`, `2..`, `..3`, `2..-2` against them.

use crate::error::OptionsError;

/// One token of a line, with its position in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text, including trailing whitespace/delimiter.
    pub text: String,
    /// Character offset of the token start within the original line.
    pub prefix_length: u32,
}

/// How a line is split into tokens.
#[derive(Debug, Clone, Default)]
pub enum Delimiter {
    /// AWK-style: non-whitespace runs, trailing whitespace attached.
    #[default]
    AwkStyle,
    /// Fixed string delimiter, kept on the token tail.
    Str(Box<str>),
    /// Regex delimiter, kept on the token tail.
    Regex(regex::Regex),
}

impl Delimiter {
    /// Builds a delimiter from the raw `--delimiter` flag value.
    ///
    /// A single-character or plain-string value becomes a fixed-string
    /// delimiter; anything containing regex metacharacters is compiled.
    pub fn parse(raw: &str) -> Result<Self, OptionsError> {
        if raw.is_empty() {
            return Ok(Self::AwkStyle);
        }
        if raw.chars().all(|c| !"\\^$.|?*+()[]{}".contains(c)) {
            return Ok(Self::Str(raw.into()));
        }
        Ok(Self::Regex(regex::Regex::new(raw)?))
    }
}

/// An inclusive 1-based field range; negative indices count from the
/// last field. `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    begin: Option<i32>,
    end: Option<i32>,
}

impl FieldRange {
    /// Parses one range expression (`3`, `-2`, `1..3`, `..-1`, `..`).
    pub fn parse(expr: &str) -> Result<Self, OptionsError> {
        let invalid = || OptionsError::FieldRange(expr.to_string());
        let parse_bound = |s: &str| -> Result<Option<i32>, OptionsError> {
            if s.is_empty() {
                return Ok(None);
            }
            let n: i32 = s.parse().map_err(|_| invalid())?;
            if n == 0 {
                return Err(invalid());
            }
            Ok(Some(n))
        };

        if let Some((lhs, rhs)) = expr.split_once("..") {
            Ok(Self {
                begin: parse_bound(lhs)?,
                end: parse_bound(rhs)?,
            })
        } else {
            let n = parse_bound(expr)?.ok_or_else(invalid)?;
            Ok(Self {
                begin: Some(n),
                end: Some(n),
            })
        }
    }

    /// Parses a comma-separated list of range expressions.
    pub fn parse_list(exprs: &str) -> Result<Vec<Self>, OptionsError> {
        exprs.split(',').map(|e| Self::parse(e.trim())).collect()
    }

    /// Resolves this range against `count` fields, returning a 0-based
    /// half-open index range, or `None` when it selects nothing.
    fn resolve(self, count: usize) -> Option<(usize, usize)> {
        let count_i = i32::try_from(count).ok()?;
        let clamp = |n: i32| -> i32 {
            if n < 0 { count_i + n + 1 } else { n }
        };
        let begin = self.begin.map_or(1, clamp).max(1);
        let end = self.end.map_or(count_i, clamp).min(count_i);
        if begin > end {
            return None;
        }
        let begin = usize::try_from(begin - 1).ok()?;
        let end = usize::try_from(end).ok()?;
        Some((begin, end))
    }
}

/// Splits `text` into tokens per the delimiter.
#[must_use]
pub fn tokenize(text: &str, delimiter: &Delimiter) -> Vec<Token> {
    match delimiter {
        Delimiter::AwkStyle => tokenize_awk(text),
        Delimiter::Str(s) => {
            let mut tokens = Vec::new();
            let mut char_pos: u32 = 0;
            let mut rest = text;
            while let Some(idx) = rest.find(s.as_ref()) {
                let end = idx + s.len();
                push_token(&mut tokens, &rest[..end], &mut char_pos);
                rest = &rest[end..];
            }
            if !rest.is_empty() {
                push_token(&mut tokens, rest, &mut char_pos);
            }
            tokens
        }
        Delimiter::Regex(re) => {
            let mut tokens = Vec::new();
            let mut char_pos: u32 = 0;
            let mut last = 0;
            for m in re.find_iter(text) {
                if m.end() == last {
                    continue;
                }
                push_token(&mut tokens, &text[last..m.end()], &mut char_pos);
                last = m.end();
            }
            if last < text.len() {
                push_token(&mut tokens, &text[last..], &mut char_pos);
            }
            tokens
        }
    }
}

fn push_token(tokens: &mut Vec<Token>, text: &str, char_pos: &mut u32) {
    let len = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    tokens.push(Token {
        text: text.to_string(),
        prefix_length: *char_pos,
    });
    *char_pos += len;
}

/// AWK-style split: a token is a non-whitespace run plus its trailing
/// whitespace; leading whitespace belongs to the first token.
fn tokenize_awk(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut current = String::new();
    let mut start: u32 = 0;
    let mut pos: u32 = 0;
    let mut in_tail = false;

    for ch in text.chars() {
        let is_ws = ch == ' ' || ch == '\t';
        if in_tail && !is_ws && !current.is_empty() {
            tokens.push(Token {
                text: std::mem::take(&mut current),
                prefix_length: start,
            });
            start = pos;
            in_tail = false;
        } else if is_ws && !current.trim().is_empty() {
            in_tail = true;
        }
        current.push(ch);
        pos += 1;
    }
    if !current.is_empty() {
        tokens.push(Token {
            text: current,
            prefix_length: start,
        });
    }
    tokens
}

/// Joins the fields selected by `ranges` into the `--nth` match target.
///
/// Returns `None` when the ranges select nothing, in which case the
/// item matches against its full text.
#[must_use]
pub fn transform(tokens: &[Token], ranges: &[FieldRange]) -> Option<String> {
    if tokens.is_empty() || ranges.is_empty() {
        return None;
    }
    let mut out = String::new();
    for range in ranges {
        if let Some((begin, end)) = range.resolve(tokens.len()) {
            for token in &tokens[begin..end] {
                out.push_str(&token.text);
            }
        }
    }
    if out.is_empty() { None } else { Some(out) }
}
