//! Grammar DSL
//!
//! A fluent API for building [`Grammar`] values in Rust, without a textual
//! grammar file.
//!
//! # Example
//!
//! ```rust
//! use pegstream::grammar::dsl::*;
//!
//! // return {[a-zA-Z]+} ' '+ {[a-zA-Z]+} {[!.?]} -> [$1, $2, $3];
//! let grammar = GrammarBuilder::new()
//!     .ruleset("return", vec![rule(
//!         vec![seq(vec![
//!             capture(vec![seq(vec![class("[a-zA-Z]").plus()])]),
//!             lit(" ").plus(),
//!             capture(vec![seq(vec![class("[a-zA-Z]").plus()])]),
//!             capture(vec![seq(vec![class("[!.?]")])]),
//!         ])],
//!         array(vec![back(1), back(2), back(3)]),
//!     )])
//!     .build();
//!
//! assert_eq!(grammar.rulesets.len(), 1);
//! ```

use super::char_class::parse_class_spec;
use super::{
    Access, Descriptor, Grammar, Meta, ObjectMember, PatternNode, RuleNode, RulesetNode,
    TokenNode, ValueKind, ValueNode, VarNode,
};
use crate::source_location::SourcePosition;
use crate::value::Value;

/// Builder for [`Grammar`] values
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ruleset with its alternatives in order
    pub fn ruleset(mut self, name: &str, rules: Vec<RuleNode>) -> Self {
        self.grammar.rulesets.push(RulesetNode {
            name: name.to_string(),
            rules,
            id: 0,
            pos: None,
        });
        self
    }

    /// Add a named constant
    pub fn var(mut self, name: &str, value: ValueNode) -> Self {
        self.grammar.vars.push(VarNode {
            name: name.to_string(),
            value,
            pos: None,
        });
        self
    }

    /// Finish building
    pub fn build(self) -> Grammar {
        self.grammar
    }
}

// ============================================================================
// Patterns and tokens
// ============================================================================

/// A sequence of tokens
pub fn seq(tokens: Vec<TokenNode>) -> PatternNode {
    PatternNode::new(tokens)
}

/// Literal text: `'abc'`
pub fn lit(text: &str) -> TokenNode {
    TokenNode::new(Descriptor::String {
        value: text.to_string(),
        terminal: None,
    })
}

/// Character class: `[a-z]`, `[^"\\]`, `[\d_]`
pub fn class(spec: &str) -> TokenNode {
    let (ranges, negated) = parse_class_spec(spec);
    TokenNode::new(Descriptor::Class {
        ranges,
        negated,
        terminal: None,
    })
}

/// Any one character: `.`
pub fn any() -> TokenNode {
    TokenNode::new(Descriptor::Any { terminal: None })
}

/// Reference to a ruleset
pub fn rule_ref(name: &str) -> TokenNode {
    TokenNode::new(Descriptor::RuleRef {
        name: name.to_string(),
        target: None,
    })
}

/// Capture: `{ ... }`
pub fn capture(patterns: Vec<PatternNode>) -> TokenNode {
    TokenNode::new(Descriptor::Capture { patterns, slot: 0 })
}

/// Capture of a rule's structured output: `{name}`
pub fn capture_ref(name: &str) -> TokenNode {
    capture(vec![seq(vec![rule_ref(name)])])
}

/// Unlabeled alternation: `( ... | ... )`
pub fn group(patterns: Vec<PatternNode>) -> TokenNode {
    TokenNode::new(Descriptor::Group { patterns })
}

impl TokenNode {
    /// `x?`
    pub fn opt(mut self) -> Self {
        self.required = false;
        self.repeat = false;
        self
    }

    /// `x*`
    pub fn star(mut self) -> Self {
        self.required = false;
        self.repeat = true;
        self
    }

    /// `x+`
    pub fn plus(mut self) -> Self {
        self.required = true;
        self.repeat = true;
        self
    }

    /// `&x`
    pub fn and(mut self) -> Self {
        self.and = true;
        self.not = false;
        self
    }

    /// `!x`
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.not = true;
        self.and = false;
        self
    }

    /// Attach a grammar position
    pub fn at(mut self, pos: SourcePosition) -> Self {
        self.pos = Some(pos);
        self
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Rule alternative with an output template: `patterns -> output`
pub fn rule(patterns: Vec<PatternNode>, output: ValueNode) -> RuleNode {
    RuleNode {
        patterns,
        output: Some(output),
        captures: Vec::new(),
        id: 0,
        pos: None,
    }
}

/// Rule alternative producing the matched text
pub fn rule_text(patterns: Vec<PatternNode>) -> RuleNode {
    RuleNode {
        patterns,
        output: None,
        captures: Vec::new(),
        id: 0,
        pos: None,
    }
}

// ============================================================================
// Output templates
// ============================================================================

/// `$n`; `$0` is the matched text
pub fn back(index: usize) -> ValueNode {
    ValueNode::new(ValueKind::BackRef {
        index,
        collapse: false,
    })
}

/// `[a, b, ...]`
pub fn array(items: Vec<ValueNode>) -> ValueNode {
    ValueNode::new(ValueKind::Array { items })
}

/// `{ ... }`
pub fn object(members: Vec<ObjectMember>) -> ValueNode {
    ValueNode::new(ValueKind::Object { members })
}

/// `key: value` inside [`object`]
pub fn pair(key: &str, value: ValueNode) -> ObjectMember {
    ObjectMember::Pair {
        key: key.to_string(),
        value,
    }
}

/// `...value` inside [`object`]
pub fn merge(value: ValueNode) -> ObjectMember {
    ObjectMember::Spread { value }
}

/// `...value` inside [`array`] or [`call`] arguments
pub fn spread(value: ValueNode) -> ValueNode {
    ValueNode::new(ValueKind::Spread {
        inner: Box::new(value),
    })
}

/// Literal value
pub fn literal(value: Value) -> ValueNode {
    ValueNode::new(ValueKind::Literal { value })
}

/// String literal
pub fn text(s: &str) -> ValueNode {
    literal(Value::from(s))
}

/// Integer literal
pub fn int(n: i64) -> ValueNode {
    literal(Value::Int(n))
}

/// Float literal
pub fn float(f: f64) -> ValueNode {
    literal(Value::Float(f))
}

/// Boolean literal
pub fn boolean(b: bool) -> ValueNode {
    literal(Value::Bool(b))
}

/// `null`
pub fn null() -> ValueNode {
    literal(Value::Null)
}

/// Grammar constant reference
pub fn var(name: &str) -> ValueNode {
    ValueNode::new(ValueKind::VarRef {
        name: name.to_string(),
    })
}

/// Absolute start offset of the match
pub fn position() -> ValueNode {
    ValueNode::new(ValueKind::MetaRef {
        meta: Meta::Position,
    })
}

/// Byte length of the match
pub fn length() -> ValueNode {
    ValueNode::new(ValueKind::MetaRef { meta: Meta::Length })
}

/// Callback invocation
pub fn call(name: &str, args: Vec<ValueNode>) -> ValueNode {
    ValueNode::new(ValueKind::Call {
        name: name.to_string(),
        args,
    })
}

/// Transpose rows and columns
pub fn pivot(value: ValueNode) -> ValueNode {
    ValueNode::new(ValueKind::Pivot {
        inner: Box::new(value),
    })
}

impl ValueNode {
    /// `$n?`: drop null placeholders of failed optional captures
    ///
    /// No effect on nodes other than backreferences.
    pub fn collapse(mut self) -> Self {
        if let ValueKind::BackRef { collapse, .. } = &mut self.kind {
            *collapse = true;
        }
        self
    }

    /// `.key`
    pub fn prop(mut self, key: &str) -> Self {
        self.access.push(Access::Property(key.to_string()));
        self
    }

    /// `[n]`
    pub fn index(mut self, index: usize) -> Self {
        self.access.push(Access::Index(index));
        self
    }
}
