//! Character classes
//!
//! A class is written as a bracketed spec such as `[a-zA-Z_]`, `[^"\\]` or
//! `[\d.]`. The spec is parsed into [`ClassRange`]s stored on the grammar
//! node, and compiled once into a [`CharClass`] table for matching.
//!
//! ASCII membership is a two-word bitmap lookup; everything above U+007F is
//! a binary search over sorted, merged ranges.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// An inclusive range of characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassRange {
    /// First character in the range
    pub from: char,
    /// Last character in the range
    pub to: char,
}

impl ClassRange {
    /// Range covering a single character
    #[inline]
    pub fn single(c: char) -> Self {
        Self { from: c, to: c }
    }

    /// Range covering `from..=to`
    #[inline]
    pub fn new(from: char, to: char) -> Self {
        Self { from, to }
    }
}

const DIGIT: &[ClassRange] = &[ClassRange { from: '0', to: '9' }];
const WORD: &[ClassRange] = &[
    ClassRange { from: '0', to: '9' },
    ClassRange { from: 'A', to: 'Z' },
    ClassRange { from: '_', to: '_' },
    ClassRange { from: 'a', to: 'z' },
];
const SPACE: &[ClassRange] = &[
    ClassRange { from: '\t', to: '\r' },
    ClassRange { from: ' ', to: ' ' },
];

/// Parse a class spec into its ranges and negation flag
///
/// Surrounding brackets are optional: `"[a-z]"` and `"a-z"` are the same
/// class. Inverted ranges such as `z-a` are kept as written; the grammar
/// compiler rejects them with a position attached.
///
/// ```rust
/// use pegstream::grammar::char_class::{parse_class_spec, ClassRange};
///
/// let (ranges, negated) = parse_class_spec("[^a-c_]");
/// assert!(negated);
/// assert_eq!(ranges, vec![ClassRange::new('a', 'c'), ClassRange::single('_')]);
/// ```
pub fn parse_class_spec(spec: &str) -> (Vec<ClassRange>, bool) {
    let body = spec
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(spec);
    let (body, negated) = match body.strip_prefix('^') {
        Some(rest) => (rest, true),
        None => (body, false),
    };

    let mut ranges = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        let from = if c == '\\' {
            match chars.next() {
                Some('d') => {
                    ranges.extend_from_slice(DIGIT);
                    continue;
                }
                Some('w') => {
                    ranges.extend_from_slice(WORD);
                    continue;
                }
                Some('s') => {
                    ranges.extend_from_slice(SPACE);
                    continue;
                }
                Some(e) => unescape(e),
                None => '\\',
            }
        } else {
            c
        };

        // A '-' at the very end is a literal dash
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') {
            if let Some(next) = lookahead.next() {
                chars.next();
                chars.next();
                let to = if next == '\\' {
                    chars.next().map_or('\\', unescape)
                } else {
                    next
                };
                ranges.push(ClassRange::new(from, to));
                continue;
            }
        }
        ranges.push(ClassRange::single(from));
    }

    (ranges, negated)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Render ranges back into bracketed spec form, for diagnostics
pub fn describe_class(ranges: &[ClassRange], negated: bool) -> String {
    let mut out = String::from("[");
    if negated {
        out.push('^');
    }
    for range in ranges {
        push_escaped(&mut out, range.from);
        if range.to != range.from {
            out.push('-');
            push_escaped(&mut out, range.to);
        }
    }
    out.push(']');
    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\0' => out.push_str("\\0"),
        '\\' | ']' | '-' | '^' => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() => {
            let _ = write!(out, "\\u{{{:x}}}", c as u32);
        }
        c => out.push(c),
    }
}

/// Compiled character class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharClass {
    ascii: [u64; 2],
    wide: Vec<(char, char)>,
    negated: bool,
}

impl CharClass {
    /// Compile ranges into a lookup table
    ///
    /// Returns the first inverted range as the error.
    pub fn new(ranges: &[ClassRange], negated: bool) -> Result<Self, ClassRange> {
        let mut ascii = [0u64; 2];
        let mut wide: Vec<(char, char)> = Vec::new();

        for range in ranges {
            if range.from > range.to {
                return Err(*range);
            }
            let (from, to) = (range.from as u32, range.to as u32);
            for b in from..=to.min(0x7F) {
                ascii[(b >> 6) as usize] |= 1u64 << (b & 63);
            }
            if to > 0x7F {
                let lo = char::from_u32(from.max(0x80)).unwrap_or(range.from);
                wide.push((lo, range.to));
            }
        }

        wide.sort_unstable();
        let mut merged: Vec<(char, char)> = Vec::with_capacity(wide.len());
        for (lo, hi) in wide {
            match merged.last_mut() {
                Some(last) if (lo as u32) <= (last.1 as u32).saturating_add(1) => {
                    if hi > last.1 {
                        last.1 = hi;
                    }
                }
                _ => merged.push((lo, hi)),
            }
        }

        Ok(Self {
            ascii,
            wide: merged,
            negated,
        })
    }

    /// Test membership
    #[inline]
    pub fn matches(&self, c: char) -> bool {
        let code = c as u32;
        let hit = if code < 0x80 {
            self.ascii[(code >> 6) as usize] & (1u64 << (code & 63)) != 0
        } else {
            self.wide
                .binary_search_by(|&(lo, hi)| {
                    if hi < c {
                        std::cmp::Ordering::Less
                    } else if lo > c {
                        std::cmp::Ordering::Greater
                    } else {
                        std::cmp::Ordering::Equal
                    }
                })
                .is_ok()
        };
        hit != self.negated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(spec: &str) -> CharClass {
        let (ranges, negated) = parse_class_spec(spec);
        CharClass::new(&ranges, negated).unwrap()
    }

    #[test]
    fn test_simple_ranges() {
        let class = compile("[a-zA-Z]");
        assert!(class.matches('a'));
        assert!(class.matches('Q'));
        assert!(!class.matches('5'));
        assert!(!class.matches('é'));
    }

    #[test]
    fn test_negated() {
        let class = compile("[^\"\\\\]");
        assert!(class.matches('x'));
        assert!(class.matches('世'));
        assert!(!class.matches('"'));
        assert!(!class.matches('\\'));
    }

    #[test]
    fn test_shorthands() {
        let class = compile("[\\d\\s]");
        assert!(class.matches('7'));
        assert!(class.matches(' '));
        assert!(class.matches('\n'));
        assert!(!class.matches('a'));

        let word = compile("\\w");
        assert!(word.matches('_'));
        assert!(!word.matches('-'));
    }

    #[test]
    fn test_trailing_dash_is_literal() {
        let (ranges, _) = parse_class_spec("[+-]");
        assert_eq!(ranges, vec![ClassRange::single('+'), ClassRange::single('-')]);
    }

    #[test]
    fn test_escaped_range_end() {
        let (ranges, _) = parse_class_spec("[!-\\]]");
        assert_eq!(ranges, vec![ClassRange::new('!', ']')]);
    }

    #[test]
    fn test_non_ascii_ranges_merge() {
        let class = CharClass::new(
            &[
                ClassRange::new('α', 'γ'),
                ClassRange::new('β', 'ε'),
                ClassRange::single('世'),
            ],
            false,
        )
        .unwrap();
        assert!(class.matches('δ'));
        assert!(class.matches('世'));
        assert!(!class.matches('界'));
    }

    #[test]
    fn test_range_crossing_ascii_boundary() {
        let class = CharClass::new(&[ClassRange::new('z', 'é')], false).unwrap();
        assert!(class.matches('z'));
        assert!(class.matches('~'));
        assert!(class.matches('é'));
        assert!(!class.matches('y'));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let (ranges, negated) = parse_class_spec("[z-a]");
        assert_eq!(CharClass::new(&ranges, negated), Err(ClassRange::new('z', 'a')));
    }

    #[test]
    fn test_describe() {
        let (ranges, negated) = parse_class_spec("[^a-z\\-]");
        assert_eq!(describe_class(&ranges, negated), "[^a-z\\-]");
    }
}
