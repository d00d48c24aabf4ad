//! Output templates
//!
//! Each rule alternative carries an optional template describing the value
//! produced when it matches. Templates reference captures by index (`$1`),
//! grammar constants by name, and match metadata (position, length), and
//! can call host functions configured on the parser.

use crate::error::AccessError;
use crate::source_location::SourcePosition;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An output template node with optional trailing access chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueNode {
    /// What the node produces
    pub kind: ValueKind,
    /// `.prop` / `[index]` steps applied to the produced value, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access: Vec<Access>,
    /// Where the template was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePosition>,
}

impl ValueNode {
    /// Create a node without access steps or position
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            access: Vec::new(),
            pos: None,
        }
    }

    /// Attach a source position
    pub fn at(mut self, pos: SourcePosition) -> Self {
        self.pos = Some(pos);
        self
    }
}

/// Template node variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    /// A constant value
    Literal {
        /// The value
        value: Value,
    },
    /// `$n`: capture slot `n`, or the matched text for `$0`
    BackRef {
        /// Capture index
        index: usize,
        /// Drop nulls left by failed optional captures (`$n?`)
        #[serde(default)]
        collapse: bool,
    },
    /// A grammar constant
    VarRef {
        /// Constant name
        name: String,
    },
    /// Match metadata
    MetaRef {
        /// Which metadata
        meta: Meta,
    },
    /// `...x`: splice into the enclosing array, object or call arguments
    Spread {
        /// Spread operand
        inner: Box<ValueNode>,
    },
    /// `{ k: v, ...x }`
    Object {
        /// Members in evaluation order
        members: Vec<ObjectMember>,
    },
    /// `[a, b, ...c]`
    Array {
        /// Elements in evaluation order
        items: Vec<ValueNode>,
    },
    /// `name(args)`: a configured callback
    Call {
        /// Callback name
        name: String,
        /// Arguments in evaluation order; may contain spreads
        #[serde(default)]
        args: Vec<ValueNode>,
    },
    /// `pivot(x)`: transpose rows and columns
    Pivot {
        /// Value to transpose
        inner: Box<ValueNode>,
    },
}

/// Match metadata available to templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Meta {
    /// Absolute start offset of the match
    Position,
    /// Byte length of the match
    Length,
}

/// A member of an object template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectMember {
    /// `key: value`
    Pair {
        /// Member key
        key: String,
        /// Member value
        value: ValueNode,
    },
    /// `...value`: merge an object, or `[key, value]` pairs
    Spread {
        /// Spread operand
        value: ValueNode,
    },
}

/// One step of an access chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// `.key`
    Property(String),
    /// `[n]`
    Index(usize),
}

impl Access {
    /// Apply this step to `value`
    ///
    /// Indexing a string yields its `n`th character.
    pub fn apply(&self, value: Value) -> Result<Value, AccessError> {
        match (self, value) {
            (Access::Property(key), Value::Object(map)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| AccessError::MissingProperty { key: key.clone() }),
            (Access::Property(key), other) => Err(AccessError::NotAnObject {
                key: key.clone(),
                found: other.kind_name(),
            }),
            (Access::Index(index), Value::Array(items)) => {
                items.get(*index).cloned().ok_or(AccessError::IndexOutOfRange {
                    index: *index,
                    len: items.len(),
                })
            }
            (Access::Index(index), Value::String(s)) => match s.chars().nth(*index) {
                Some(c) => Ok(Value::String(c.to_string())),
                None => Err(AccessError::IndexOutOfRange {
                    index: *index,
                    len: s.chars().count(),
                }),
            },
            (Access::Index(index), other) => Err(AccessError::NotIndexable {
                index: *index,
                found: other.kind_name(),
            }),
        }
    }
}

/// Apply an access chain left to right
pub fn apply_access(mut value: Value, steps: &[Access]) -> Result<Value, AccessError> {
    for step in steps {
        value = step.apply(value)?;
    }
    Ok(value)
}

impl ValueNode {
    /// Visit this node and every nested node, depth-first
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a ValueNode)) {
        f(self);
        match &self.kind {
            ValueKind::Spread { inner } | ValueKind::Pivot { inner } => inner.walk(f),
            ValueKind::Array { items } => items.iter().for_each(|item| item.walk(f)),
            ValueKind::Call { args, .. } => args.iter().for_each(|arg| arg.walk(f)),
            ValueKind::Object { members } => {
                for member in members {
                    match member {
                        ObjectMember::Pair { value, .. } | ObjectMember::Spread { value } => {
                            value.walk(f)
                        }
                    }
                }
            }
            ValueKind::Literal { .. }
            | ValueKind::BackRef { .. }
            | ValueKind::VarRef { .. }
            | ValueKind::MetaRef { .. } => {}
        }
    }
}
