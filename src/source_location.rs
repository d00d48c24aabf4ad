//! Source Location Utilities
//!
//! Positions attached to grammar nodes (where a grammar was written) and to
//! parse errors (where in the input a match gave up).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in characters)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Create a position at the start of input
    #[inline]
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    /// Calculate position from a byte offset in `input`
    ///
    /// Offsets past the end are clamped to the input length.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());
        let prefix = &input.as_bytes()[..offset];

        let line = 1 + memchr::memchr_iter(b'\n', prefix).count();
        let line_start = memchr::memrchr(b'\n', prefix).map_or(0, |n| n + 1);
        let column = 1 + count_chars(&prefix[line_start..]);

        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::start()
    }
}

/// Count UTF-8 characters in a byte slice that starts on a char boundary
#[inline]
pub(crate) fn count_chars(bytes: &[u8]) -> usize {
    // Continuation bytes are 0b10xx_xxxx; everything else starts a char.
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}

/// Render a source line with a caret under the given 1-based column
pub fn pointer_text(line: &str, column: usize) -> String {
    let mut out = String::with_capacity(line.len() + column + 2);
    out.push_str(line);
    out.push('\n');
    for ch in line.chars().take(column.saturating_sub(1)) {
        // Keep tabs so the caret lines up under tab-indented text
        out.push(if ch == '\t' { '\t' } else { ' ' });
    }
    out.push('^');
    out
}
