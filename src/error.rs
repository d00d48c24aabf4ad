//! Error types
//!
//! Two families, matching the two phases of the engine:
//!
//! - [`GrammarError`] is raised while compiling a grammar. It is fatal: the
//!   grammar cannot be used until it is fixed.
//! - [`ParseError`] is raised while matching input. It carries the furthest
//!   position reached and the terminals that were still viable there.
//!
//! Every error has a stable numeric [`code`](ParseError::code): grammar
//! errors use the 100 range, parse errors the 200 range.

use crate::source_location::SourcePosition;
use std::fmt;
use thiserror::Error;

fn at(pos: &Option<SourcePosition>) -> String {
    match pos {
        Some(p) => format!(" at {}", p),
        None => String::new(),
    }
}

/// Grammar compilation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// Two rulesets share a name
    #[error("duplicate ruleset `{name}`{}", at(.pos))]
    DuplicateRuleset {
        /// Ruleset name
        name: String,
        /// Position of the second definition
        pos: Option<SourcePosition>,
    },

    /// Two grammar constants share a name
    #[error("duplicate constant `{name}`{}", at(.pos))]
    DuplicateVar {
        /// Constant name
        name: String,
        /// Position of the second definition
        pos: Option<SourcePosition>,
    },

    /// More than one `return` ruleset
    #[error("more than one `return` ruleset{}", at(.pos))]
    MultipleReturn {
        /// Position of the second definition
        pos: Option<SourcePosition>,
    },

    /// No `return` ruleset
    #[error("grammar has no `return` ruleset")]
    MissingReturn,

    /// Reference to a ruleset that does not exist
    #[error("reference to undefined ruleset `{name}`{}", at(.pos))]
    UnresolvedRule {
        /// Referenced name
        name: String,
        /// Position of the reference
        pos: Option<SourcePosition>,
    },

    /// Reference to a constant that does not exist (or is not yet defined)
    #[error("reference to undefined constant `{name}`{}", at(.pos))]
    UnresolvedVar {
        /// Referenced name
        name: String,
        /// Position of the reference
        pos: Option<SourcePosition>,
    },

    /// Ruleset that cannot be reached from `return`
    #[error("ruleset `{name}` is unreachable from `return`{}", at(.pos))]
    UnreachableRuleset {
        /// Ruleset name
        name: String,
        /// Position of the definition
        pos: Option<SourcePosition>,
    },

    /// Backreference index larger than the rule's capture count
    #[error("backreference ${index} out of range: rule has {arity} capture(s){}", at(.pos))]
    BackRefOutOfRange {
        /// The `$n` index
        index: usize,
        /// Number of captures in the rule
        arity: usize,
        /// Position of the rule
        pos: Option<SourcePosition>,
    },

    /// Alternatives of one rule disagree on their capture layout
    #[error(
        "capture mismatch in `{ruleset}`: expected {expected} capture(s) with identical arity, found {found}{}",
        at(.pos)
    )]
    CaptureCountMismatch {
        /// Ruleset containing the rule
        ruleset: String,
        /// Capture count of the first alternative
        expected: usize,
        /// Capture count of the offending alternative
        found: usize,
        /// Position of the offending alternative
        pos: Option<SourcePosition>,
    },

    /// Spread used outside an array/object/call, or on a scalar literal
    #[error("invalid spread: {reason}{}", at(.pos))]
    InvalidSpread {
        /// What is wrong with the spread
        reason: String,
        /// Position of the template node
        pos: Option<SourcePosition>,
    },

    /// Property or index access that can never succeed
    #[error("invalid access: {reason}{}", at(.pos))]
    InvalidAccess {
        /// What is wrong with the access
        reason: String,
        /// Position of the template node
        pos: Option<SourcePosition>,
    },

    /// Call template naming a callback that was not configured
    #[error("unknown callback `{name}`{}", at(.pos))]
    UnknownCallback {
        /// Callback name
        name: String,
        /// Position of the call
        pos: Option<SourcePosition>,
    },

    /// Character class with an inverted range
    #[error("invalid character class range {from:?}-{to:?}{}", at(.pos))]
    InvalidClass {
        /// Range start
        from: char,
        /// Range end
        to: char,
        /// Position of the token
        pos: Option<SourcePosition>,
    },

    /// Constant whose template cannot be evaluated at compile time
    #[error("invalid constant `{name}`: {reason}")]
    InvalidConstant {
        /// Constant name
        name: String,
        /// Why it cannot be evaluated
        reason: String,
    },
}

impl GrammarError {
    /// Stable numeric error code
    pub fn code(&self) -> u32 {
        match self {
            GrammarError::DuplicateRuleset { .. } => 101,
            GrammarError::MultipleReturn { .. } => 102,
            GrammarError::MissingReturn => 103,
            GrammarError::UnresolvedRule { .. } => 104,
            GrammarError::UnresolvedVar { .. } => 105,
            GrammarError::BackRefOutOfRange { .. } => 106,
            GrammarError::CaptureCountMismatch { .. } => 107,
            GrammarError::InvalidSpread { .. } => 108,
            GrammarError::InvalidAccess { .. } => 109,
            GrammarError::UnknownCallback { .. } => 110,
            GrammarError::UnreachableRuleset { .. } => 111,
            GrammarError::DuplicateVar { .. } => 112,
            GrammarError::InvalidConstant { .. } => 113,
            GrammarError::InvalidClass { .. } => 114,
        }
    }
}

/// Failed property or index access in an output template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Property access on something that is not an object
    #[error("cannot read property `{key}` of a {found} value")]
    NotAnObject {
        /// Requested key
        key: String,
        /// Kind of the actual value
        found: &'static str,
    },

    /// Property access on an object without that key
    #[error("property `{key}` does not exist")]
    MissingProperty {
        /// Requested key
        key: String,
    },

    /// Index access on something that is not an array or string
    #[error("cannot index a {found} value with [{index}]")]
    NotIndexable {
        /// Requested index
        index: usize,
        /// Kind of the actual value
        found: &'static str,
    },

    /// Index past the end
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Actual length
        len: usize,
    },
}

/// Why a parse failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    /// The grammar rejected the input
    #[error("no match")]
    NoMatch,

    /// The grammar matched a prefix but input remained when the stream closed
    #[error("unexpected input after a complete match")]
    UnconsumedInput,

    /// A read landed below the retained window of the input buffer
    #[error("input at offset {offset} was freed (retained window starts at {retained_from})")]
    InputFreed {
        /// Requested offset
        offset: usize,
        /// First offset still retained
        retained_from: usize,
    },

    /// Property/index access failed while building output
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Spread of a value that cannot be spread in its context
    #[error("cannot spread a {found} value here")]
    InvalidSpread {
        /// Kind of the spread value
        found: &'static str,
    },

    /// Pivot of a value that has no transposed form
    #[error("cannot pivot a {found} value")]
    InvalidPivot {
        /// Kind of the pivoted value
        found: &'static str,
    },

    /// A configured callback returned an error
    #[error("callback `{name}` failed: {message}")]
    Callback {
        /// Callback name
        name: String,
        /// Message returned by the callback
        message: String,
    },

    /// `write` was called after `close`
    #[error("write after close")]
    WriteAfterClose,

    /// Reading input from an `io::Read` failed
    #[error("i/o error: {0}")]
    Io(String),

    /// Engine invariant violated; indicates a bug, not bad input
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParseErrorKind {
    /// Stable numeric error code
    pub fn code(&self) -> u32 {
        match self {
            ParseErrorKind::NoMatch => 200,
            ParseErrorKind::UnconsumedInput => 201,
            ParseErrorKind::InputFreed { .. } => 202,
            ParseErrorKind::Access(_) => 203,
            ParseErrorKind::InvalidSpread { .. } => 204,
            ParseErrorKind::InvalidPivot { .. } => 205,
            ParseErrorKind::Callback { .. } => 206,
            ParseErrorKind::WriteAfterClose => 207,
            ParseErrorKind::Io(_) => 208,
            ParseErrorKind::Internal(_) => 299,
        }
    }
}

/// A parse failure with its location and "expected" diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// What went wrong
    pub kind: ParseErrorKind,
    /// Absolute byte offset the error is reported at
    pub position: usize,
    /// Line of `position` (1-based), when it could be computed
    pub line: Option<usize>,
    /// Column of `position` (1-based, in characters), when it could be computed
    pub column: Option<usize>,
    /// The source line with a caret under `position`, when still retained
    pub pointer: Option<String>,
    /// Sorted descriptions of the terminals viable at `position`
    pub expected: Vec<String>,
}

impl ParseError {
    /// Create an error without location details
    pub fn new(kind: ParseErrorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            line: None,
            column: None,
            pointer: None,
            expected: Vec::new(),
        }
    }

    /// Stable numeric error code
    #[inline]
    pub fn code(&self) -> u32 {
        self.kind.code()
    }

    /// Human-readable reason, without location
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }

    /// Render the error with its pointer text, if any
    pub fn format_with_pointer(&self) -> String {
        match &self.pointer {
            Some(pointer) => format!("{}\n{}", self, pointer),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " at line {}, column {}", line, column)?,
            _ => write!(f, " at offset {}", self.position)?,
        }
        if !self.expected.is_empty() {
            write!(f, "; expected one of: {}", self.expected.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
