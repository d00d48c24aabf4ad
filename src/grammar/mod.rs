//! Grammar data model
//!
//! A grammar is a list of named rulesets plus named constants. One ruleset,
//! `return`, is the entry point.
//!
//! ```text
//! Grammar
//! ├── RulesetNode "return"        ordered alternatives
//! │   └── RuleNode                patterns + output template
//! │       └── PatternNode         alternative token sequences
//! │           └── TokenNode       descriptor + ? * + & ! flags
//! │               └── Descriptor  capture | group | rule ref | terminal
//! └── VarNode                     named constant template
//! ```
//!
//! Grammars are plain data: build them with [`dsl`], load them from JSON
//! with [`Grammar::from_json`], or construct the nodes directly. Fields
//! marked as annotations (`id`, `slot`, `target`, `terminal`, `captures`,
//! `can_fail`) are filled in by the [compiler](compiler) and may be left at
//! their defaults.

pub mod char_class;
pub mod compiler;
pub mod dsl;
pub mod template;
pub mod terminal;

pub use char_class::ClassRange;
pub use compiler::{CompiledGrammar, GrammarWarning, WarningKind};
pub use template::{Access, Meta, ObjectMember, ValueKind, ValueNode};

use crate::source_location::SourcePosition;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Name of the entry-point ruleset
pub const RETURN_RULESET: &str = "return";

fn yes() -> bool {
    true
}

/// A complete grammar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grammar {
    /// Rulesets in declaration order
    pub rulesets: Vec<RulesetNode>,
    /// Named constants, evaluated in declaration order
    #[serde(default)]
    pub vars: Vec<VarNode>,
    /// Ruleset name to index, filled by the compiler
    #[serde(skip)]
    pub lookup: HashMap<String, usize, ahash::RandomState>,
    /// Largest node id assigned by the compiler
    #[serde(default)]
    pub max_id: usize,
}

/// A named list of alternative rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetNode {
    /// Ruleset name
    pub name: String,
    /// Alternatives, tried in order
    pub rules: Vec<RuleNode>,
    /// Node id (annotation)
    #[serde(default)]
    pub id: usize,
    /// Where the ruleset was defined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePosition>,
}

/// One alternative of a ruleset: patterns sharing an output template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleNode {
    /// Alternative token sequences, tried in order
    pub patterns: Vec<PatternNode>,
    /// Output template; the matched text when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ValueNode>,
    /// Capture arity per slot (`true` = array-valued), slot `n` at `n - 1` (annotation)
    #[serde(default)]
    pub captures: Vec<bool>,
    /// Node id (annotation)
    #[serde(default)]
    pub id: usize,
    /// Where the rule was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePosition>,
}

/// A sequence of tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternNode {
    /// Tokens, matched left to right
    pub tokens: Vec<TokenNode>,
    /// Whether the pattern can fail at all (annotation)
    #[serde(default = "yes")]
    pub can_fail: bool,
    /// Node id (annotation)
    #[serde(default)]
    pub id: usize,
}

impl PatternNode {
    /// Create a pattern from tokens
    pub fn new(tokens: Vec<TokenNode>) -> Self {
        Self {
            tokens,
            can_fail: true,
            id: 0,
        }
    }
}

/// A descriptor with its modifiers
///
/// | written | `required` | `repeat` |
/// |---------|------------|----------|
/// | `x`     | true       | false    |
/// | `x?`    | false      | false    |
/// | `x*`    | false      | true     |
/// | `x+`    | true       | true     |
///
/// `and`/`not` wrap the token in a positive/negative lookahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenNode {
    /// What to match
    pub descriptor: Descriptor,
    /// Must match at least once
    #[serde(default = "yes")]
    pub required: bool,
    /// May match more than once
    #[serde(default)]
    pub repeat: bool,
    /// Positive lookahead (`&`)
    #[serde(default)]
    pub and: bool,
    /// Negative lookahead (`!`)
    #[serde(default)]
    pub not: bool,
    /// Node id (annotation)
    #[serde(default)]
    pub id: usize,
    /// Where the token was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePosition>,
}

impl TokenNode {
    /// A required, non-repeated token
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            required: true,
            repeat: false,
            and: false,
            not: false,
            id: 0,
            pos: None,
        }
    }

    /// Whether the token is a predicate
    #[inline]
    pub fn is_predicate(&self) -> bool {
        self.and || self.not
    }
}

/// What a token matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Descriptor {
    /// `{ ... }`: record the sub-match in a capture slot
    Capture {
        /// Alternatives
        patterns: Vec<PatternNode>,
        /// 1-based capture slot (annotation)
        #[serde(default)]
        slot: usize,
    },
    /// `( ... )`: unlabeled alternation
    Group {
        /// Alternatives
        patterns: Vec<PatternNode>,
    },
    /// Reference to a ruleset by name
    RuleRef {
        /// Ruleset name
        name: String,
        /// Ruleset index (annotation)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<usize>,
    },
    /// Literal text
    String {
        /// The text
        value: String,
        /// Terminal id (annotation)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminal: Option<usize>,
    },
    /// One character from a class
    Class {
        /// Member ranges
        ranges: Vec<ClassRange>,
        /// Match characters outside the ranges instead
        #[serde(default)]
        negated: bool,
        /// Terminal id (annotation)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminal: Option<usize>,
    },
    /// Any one character
    Any {
        /// Terminal id (annotation)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminal: Option<usize>,
    },
}

impl Descriptor {
    /// Nested alternatives of a capture or group
    pub fn patterns(&self) -> Option<&[PatternNode]> {
        match self {
            Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } => Some(patterns),
            _ => None,
        }
    }

    /// Capture slots assigned inside this descriptor, outermost first
    ///
    /// Meaningful after compilation. Alternatives share slots, so only the
    /// first alternative of each nested choice is walked.
    pub fn capture_slots(&self) -> Vec<usize> {
        let mut slots = Vec::new();
        collect_slots(self, &mut slots);
        slots
    }
}

fn collect_slots(descriptor: &Descriptor, out: &mut Vec<usize>) {
    if let Descriptor::Capture { slot, .. } = descriptor {
        out.push(*slot);
    }
    if let Some(first) = descriptor.patterns().and_then(|p| p.first()) {
        for token in &first.tokens {
            collect_slots(&token.descriptor, out);
        }
    }
}

/// A named constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarNode {
    /// Constant name
    pub name: String,
    /// Template evaluated once at compile time
    pub value: ValueNode,
    /// Where the constant was defined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePosition>,
}

impl Grammar {
    /// Create an empty grammar
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to JSON
    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    #[inline]
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Find a ruleset by name
    pub fn ruleset(&self, name: &str) -> Option<&RulesetNode> {
        match self.lookup.get(name) {
            Some(&idx) => self.rulesets.get(idx),
            None => self.rulesets.iter().find(|r| r.name == name),
        }
    }

    /// Names of all rulesets, in declaration order
    pub fn ruleset_names(&self) -> impl Iterator<Item = &str> {
        self.rulesets.iter().map(|r| r.name.as_str())
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        // `lookup` is derived from `rulesets`
        self.rulesets == other.rulesets && self.vars == other.vars && self.max_id == other.max_id
    }
}
