//! ANSI escape extraction for `--ansi` input.
//!
//! [`extract_color`] strips escape sequences from one line and returns
//! the plain text together with the color attributes of each stripped
//! region. SGR state is carried across lines through [`AnsiState`]: a
//! producer may open a color on one line and close it several lines
//! later.

/// A terminal color as carried by SGR sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnsiColor {
    /// Terminal default.
    #[default]
    Default,
    /// Palette color 0-255.
    Indexed(u8),
    /// 24-bit color.
    Rgb(u8, u8, u8),
}

/// Display attributes active over a span of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnsiAttr {
    /// Foreground color.
    pub fg: AnsiColor,
    /// Background color.
    pub bg: AnsiColor,
    /// Bold / increased intensity.
    pub bold: bool,
}

impl AnsiAttr {
    /// Returns `true` when no attribute deviates from the terminal
    /// default, i.e. the span needs no color record.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// A colored span over the stripped text, in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsiOffset {
    /// First character of the span.
    pub start: u32,
    /// One past the last character of the span.
    pub end: u32,
    /// Attributes covering the span.
    pub attr: AnsiAttr,
}

/// SGR state carried across lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiState {
    attr: AnsiAttr,
}

enum Sequence {
    Sgr(Vec<u16>),
    Other,
}

/// Strips ANSI escape sequences from `line`.
///
/// Returns the plain text and the colored spans (in character offsets
/// over the plain text), or `None` when the line carries no color.
/// `state` is updated so an unterminated color bleeds into the next
/// line.
#[must_use]
pub fn extract_color(line: &str, state: &mut AnsiState) -> (String, Option<Vec<AnsiOffset>>) {
    let mut out = String::with_capacity(line.len());
    let mut offsets: Vec<AnsiOffset> = Vec::new();
    let mut chars = line.chars().peekable();
    let mut pos: u32 = 0;

    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            if !state.attr.is_plain() {
                push_span(&mut offsets, pos, state.attr);
            }
            out.push(ch);
            pos += 1;
            continue;
        }
        match parse_sequence(&mut chars) {
            Sequence::Sgr(params) => apply_sgr(&mut state.attr, &params),
            Sequence::Other => {}
        }
    }

    if offsets.is_empty() {
        (out, None)
    } else {
        (out, Some(offsets))
    }
}

/// Extends the trailing span when the attribute is unchanged and
/// contiguous; opens a new span otherwise.
fn push_span(offsets: &mut Vec<AnsiOffset>, pos: u32, attr: AnsiAttr) {
    if let Some(last) = offsets.last_mut()
        && last.end == pos
        && last.attr == attr
    {
        last.end = pos + 1;
        return;
    }
    offsets.push(AnsiOffset {
        start: pos,
        end: pos + 1,
        attr,
    });
}

/// Consumes one escape sequence following an ESC byte.
fn parse_sequence(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Sequence {
    match chars.peek() {
        Some('[') => {
            chars.next();
            let mut params: Vec<u16> = Vec::new();
            let mut current: u32 = 0;
            let mut saw_digit = false;
            for ch in chars.by_ref() {
                match ch {
                    '0'..='9' => {
                        current = (current * 10 + (ch as u32 - '0' as u32)).min(u32::from(u16::MAX));
                        saw_digit = true;
                    }
                    ';' | ':' => {
                        params.push(u16::try_from(current).unwrap_or(u16::MAX));
                        current = 0;
                        saw_digit = false;
                    }
                    // Final byte of a CSI sequence.
                    '\x40'..='\x7e' => {
                        if saw_digit || !params.is_empty() {
                            params.push(u16::try_from(current).unwrap_or(u16::MAX));
                        }
                        return if ch == 'm' { Sequence::Sgr(params) } else { Sequence::Other };
                    }
                    _ => {}
                }
            }
            Sequence::Other
        }
        // OSC: swallow until BEL or ST.
        Some(']') => {
            chars.next();
            let mut prev = '\0';
            for ch in chars.by_ref() {
                if ch == '\x07' || (prev == '\x1b' && ch == '\\') {
                    break;
                }
                prev = ch;
            }
            Sequence::Other
        }
        // Two-byte escape (e.g. ESC ( B).
        Some(_) => {
            chars.next();
            Sequence::Other
        }
        None => Sequence::Other,
    }
}

fn apply_sgr(attr: &mut AnsiAttr, params: &[u16]) {
    if params.is_empty() {
        *attr = AnsiAttr::default();
        return;
    }
    let mut it = params.iter().copied();
    while let Some(p) = it.next() {
        match p {
            0 => *attr = AnsiAttr::default(),
            1 => attr.bold = true,
            21 | 22 => attr.bold = false,
            30..=37 => attr.fg = AnsiColor::Indexed(u8::try_from(p - 30).unwrap_or(0)),
            39 => attr.fg = AnsiColor::Default,
            40..=47 => attr.bg = AnsiColor::Indexed(u8::try_from(p - 40).unwrap_or(0)),
            49 => attr.bg = AnsiColor::Default,
            90..=97 => attr.fg = AnsiColor::Indexed(u8::try_from(p - 90 + 8).unwrap_or(8)),
            100..=107 => attr.bg = AnsiColor::Indexed(u8::try_from(p - 100 + 8).unwrap_or(8)),
            38 | 48 => {
                let color = match it.next() {
                    Some(5) => it.next().map(|n| AnsiColor::Indexed(u8::try_from(n).unwrap_or(255))),
                    Some(2) => {
                        let r = it.next();
                        let g = it.next();
                        let b = it.next();
                        match (r, g, b) {
                            (Some(r), Some(g), Some(b)) => Some(AnsiColor::Rgb(
                                u8::try_from(r).unwrap_or(255),
                                u8::try_from(g).unwrap_or(255),
                                u8::try_from(b).unwrap_or(255),
                            )),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                if let Some(color) = color {
                    if p == 38 {
                        attr.fg = color;
                    } else {
                        attr.bg = color;
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_passes_through() {
        let mut state = AnsiState::default();
        let (text, offsets) = extract_color("hello", &mut state);
        assert_eq!(text, "hello");
        assert!(offsets.is_none());
    }

    #[test]
    fn test_basic_color_span() {
        let mut state = AnsiState::default();
        let (text, offsets) = extract_color("ab\x1b[31mcd\x1b[0mef", &mut state);
        assert_eq!(text, "abcdef");
        let offsets = offsets.unwrap_or_default();
        assert_eq!(offsets.len(), 1);
        assert_eq!((offsets[0].start, offsets[0].end), (2, 4));
        assert_eq!(offsets[0].attr.fg, AnsiColor::Indexed(1));
    }

    #[test]
    fn test_state_carries_across_lines() {
        let mut state = AnsiState::default();
        let (_, _) = extract_color("\x1b[32mopen", &mut state);
        let (text, offsets) = extract_color("still\x1b[0m done", &mut state);
        assert_eq!(text, "still done");
        let offsets = offsets.unwrap_or_default();
        assert_eq!((offsets[0].start, offsets[0].end), (0, 5));
        assert_eq!(offsets[0].attr.fg, AnsiColor::Indexed(2));
    }

    #[test]
    fn test_256_and_truecolor() {
        let mut state = AnsiState::default();
        let (text, offsets) = extract_color("\x1b[38;5;208mx\x1b[48;2;1;2;3my\x1b[m", &mut state);
        assert_eq!(text, "xy");
        let offsets = offsets.unwrap_or_default();
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[0].attr.fg, AnsiColor::Indexed(208));
        assert_eq!(offsets[1].attr.bg, AnsiColor::Rgb(1, 2, 3));
    }

    #[test]
    fn test_bold_and_bright() {
        let mut state = AnsiState::default();
        let (text, offsets) = extract_color("\x1b[1;91mhi\x1b[22;39m!", &mut state);
        assert_eq!(text, "hi!");
        let offsets = offsets.unwrap_or_default();
        assert_eq!(offsets.len(), 1);
        assert!(offsets[0].attr.bold);
        assert_eq!(offsets[0].attr.fg, AnsiColor::Indexed(9));
    }

    #[test]
    fn test_non_sgr_sequences_are_stripped() {
        let mut state = AnsiState::default();
        let (text, offsets) = extract_color("a\x1b[2Kb\x1b]0;title\x07c", &mut state);
        assert_eq!(text, "abc");
        assert!(offsets.is_none());
    }
}
