//! Output-value compiler
//!
//! Each output template is compiled once into a boxed function from an
//! [`OutputScope`] (the finished rule's capture slots, match bounds and the
//! input buffer) to a [`Value`].
//!
//! Arrays, objects and call arguments are built from *pieces*: plain
//! elements, spreads that splice several elements in, and collapsed
//! backreferences that vanish when their capture was skipped.

use super::buffer::{BufferError, InputBuffer};
use crate::error::{GrammarError, ParseErrorKind};
use crate::grammar::template::apply_access;
use crate::grammar::{Meta, ObjectMember, ValueKind, ValueNode, VarNode};
use crate::parser::Callbacks;
use crate::value::Value;
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Grammar constants by name
pub type Constants = HashMap<String, Value, ahash::RandomState>;

/// A compiled template
pub type OutputFn = Box<dyn Fn(&OutputScope<'_>) -> Result<Value, ParseErrorKind> + Send + Sync>;

/// Everything a template may read when a rule alternative has matched
pub struct OutputScope<'a> {
    /// Capture slot values; slot `n` at `n - 1`
    pub slots: &'a [Value],
    /// Absolute start offset of the match
    pub start: usize,
    /// Absolute end offset of the match
    pub end: usize,
    /// Input the match was made against
    pub buffer: &'a InputBuffer,
}

impl From<BufferError> for ParseErrorKind {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::InputFreed {
                offset,
                retained_from,
            } => ParseErrorKind::InputFreed {
                offset,
                retained_from,
            },
            other => ParseErrorKind::Internal(format!("unexpected buffer read failure: {}", other)),
        }
    }
}

enum Piece {
    One(OutputFn),
    Spread(OutputFn),
    Collapsible(OutputFn),
}

enum Member {
    Pair(String, OutputFn, bool),
    Merge(OutputFn),
}

/// Compiles templates for one rule
pub struct OutputCompiler<'a> {
    constants: &'a Constants,
    callbacks: &'a Callbacks,
    layout: &'a [bool],
}

impl<'a> OutputCompiler<'a> {
    /// Create a compiler for a rule with the given capture layout
    pub fn new(constants: &'a Constants, callbacks: &'a Callbacks, layout: &'a [bool]) -> Self {
        Self {
            constants,
            callbacks,
            layout,
        }
    }

    /// Output of a rule without a template: the matched text
    pub fn matched_text() -> OutputFn {
        Box::new(|scope| {
            let text = scope.buffer.substr_exact(scope.start, scope.end - scope.start)?;
            Ok(Value::String(text.into_owned()))
        })
    }

    /// Compile a template node, including its access chain
    pub fn compile(&self, node: &ValueNode) -> OutputFn {
        let base = self.compile_kind(&node.kind);
        if node.access.is_empty() {
            return base;
        }
        let steps = node.access.clone();
        Box::new(move |scope| Ok(apply_access(base(scope)?, &steps)?))
    }

    fn compile_kind(&self, kind: &ValueKind) -> OutputFn {
        match kind {
            ValueKind::Literal { value } => {
                let value = value.clone();
                Box::new(move |_| Ok(value.clone()))
            }
            ValueKind::BackRef { index: 0, .. } => Self::matched_text(),
            ValueKind::BackRef { index, collapse } => {
                let slot = index - 1;
                let is_array = self.layout.get(slot).copied().unwrap_or(false);
                if is_array && *collapse {
                    Box::new(move |scope| match scope.slots.get(slot) {
                        Some(Value::Array(items)) if items.iter().any(Value::is_null) => {
                            Ok(Value::array(items.iter().filter(|v| !v.is_null()).cloned().collect()))
                        }
                        Some(other) => Ok(other.clone()),
                        None => Ok(Value::array(Vec::new())),
                    })
                } else {
                    Box::new(move |scope| Ok(scope.slots.get(slot).cloned().unwrap_or_default()))
                }
            }
            ValueKind::VarRef { name } => {
                let value = self.constants.get(name).cloned().unwrap_or_default();
                Box::new(move |_| Ok(value.clone()))
            }
            ValueKind::MetaRef { meta: Meta::Position } => {
                Box::new(|scope| Ok(Value::Int(scope.start as i64)))
            }
            ValueKind::MetaRef { meta: Meta::Length } => {
                Box::new(|scope| Ok(Value::Int((scope.end - scope.start) as i64)))
            }
            // Placement is validated by the grammar compiler; on its own a
            // spread is just its operand
            ValueKind::Spread { inner } => self.compile(inner),
            ValueKind::Array { items } => {
                let pieces = self.compile_pieces(items);
                Box::new(move |scope| Ok(Value::array(eval_pieces(&pieces, scope)?)))
            }
            ValueKind::Object { members } => {
                let members = self.compile_members(members);
                Box::new(move |scope| eval_members(&members, scope))
            }
            ValueKind::Call { name, args } => {
                let pieces = self.compile_pieces(args);
                let name = name.clone();
                match self.callbacks.get(&name).cloned() {
                    Some(callback) => Box::new(move |scope| {
                        let args = eval_pieces(&pieces, scope)?;
                        callback(args.as_slice()).map_err(|message| ParseErrorKind::Callback {
                            name: name.clone(),
                            message,
                        })
                    }),
                    None => Box::new(move |_| {
                        Err(ParseErrorKind::Internal(format!("callback `{}` is not configured", name)))
                    }),
                }
            }
            ValueKind::Pivot { inner } => {
                let inner = self.compile(inner);
                Box::new(move |scope| pivot(inner(scope)?))
            }
        }
    }

    fn is_collapsible(&self, node: &ValueNode) -> bool {
        match node.kind {
            ValueKind::BackRef {
                index,
                collapse: true,
            } if index > 0 => !self.layout.get(index - 1).copied().unwrap_or(false),
            _ => false,
        }
    }

    fn compile_pieces(&self, items: &[ValueNode]) -> Vec<Piece> {
        items
            .iter()
            .map(|item| match &item.kind {
                ValueKind::Spread { inner } => Piece::Spread(self.compile(inner)),
                _ if self.is_collapsible(item) => Piece::Collapsible(self.compile(item)),
                _ => Piece::One(self.compile(item)),
            })
            .collect()
    }

    fn compile_members(&self, members: &[ObjectMember]) -> Vec<Member> {
        members
            .iter()
            .map(|member| match member {
                ObjectMember::Pair { key, value } => {
                    Member::Pair(key.clone(), self.compile(value), self.is_collapsible(value))
                }
                ObjectMember::Spread { value } => Member::Merge(self.compile(value)),
            })
            .collect()
    }
}

fn eval_pieces(pieces: &[Piece], scope: &OutputScope<'_>) -> Result<Vec<Value>, ParseErrorKind> {
    let mut out = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::One(f) => out.push(f(scope)?),
            Piece::Collapsible(f) => match f(scope)? {
                Value::Null => {}
                value => out.push(value),
            },
            Piece::Spread(f) => match f(scope)? {
                Value::Null => {}
                Value::Array(items) => out.extend(Arc::unwrap_or_clone(items)),
                Value::String(s) => out.extend(s.chars().map(|c| Value::String(c.to_string()))),
                Value::Object(map) => out.extend(
                    Arc::unwrap_or_clone(map)
                        .into_iter()
                        .map(|(k, v)| Value::array(vec![Value::String(k), v])),
                ),
                other => {
                    return Err(ParseErrorKind::InvalidSpread {
                        found: other.kind_name(),
                    })
                }
            },
        }
    }
    Ok(out)
}

fn eval_members(members: &[Member], scope: &OutputScope<'_>) -> Result<Value, ParseErrorKind> {
    let mut map = BTreeMap::new();
    for member in members {
        match member {
            Member::Pair(key, f, collapsible) => {
                let value = f(scope)?;
                if !(*collapsible && value.is_null()) {
                    map.insert(key.clone(), value);
                }
            }
            Member::Merge(f) => match f(scope)? {
                Value::Null => {}
                Value::Object(other) => map.extend(Arc::unwrap_or_clone(other)),
                Value::Array(entries) => {
                    for entry in Arc::unwrap_or_clone(entries) {
                        let (key, value) = into_entry(entry)?;
                        map.insert(key, value);
                    }
                }
                other => {
                    return Err(ParseErrorKind::InvalidSpread {
                        found: other.kind_name(),
                    })
                }
            },
        }
    }
    Ok(Value::from_map(map))
}

/// A `[key, value]` pair from an array spread into an object
fn into_entry(entry: Value) -> Result<(String, Value), ParseErrorKind> {
    match entry {
        Value::Array(pair) if pair.len() == 2 && matches!(pair[0], Value::String(_)) => {
            let mut pair = Arc::unwrap_or_clone(pair);
            let value = pair.pop().unwrap_or_default();
            match pair.pop() {
                Some(Value::String(key)) => Ok((key, value)),
                _ => Err(ParseErrorKind::InvalidSpread { found: "array" }),
            }
        }
        other => Err(ParseErrorKind::InvalidSpread {
            found: other.kind_name(),
        }),
    }
}

/// Transpose rows and columns
///
/// - array of arrays: transposed, short rows padded with null
/// - array of objects: object of arrays, missing keys as null
/// - object of arrays: array of objects, missing entries as null
pub fn pivot(value: Value) -> Result<Value, ParseErrorKind> {
    match value {
        Value::Array(rows) => {
            if rows.iter().all(|r| matches!(r, Value::Array(_))) {
                let width = rows.iter().filter_map(Value::as_array).map(<[Value]>::len).max();
                let columns = (0..width.unwrap_or(0))
                    .map(|j| {
                        Value::array(
                            rows.iter()
                                .map(|r| r.get_index(j).cloned().unwrap_or_default())
                                .collect(),
                        )
                    })
                    .collect();
                Ok(Value::array(columns))
            } else if rows.iter().all(|r| matches!(r, Value::Object(_))) {
                let mut columns: BTreeMap<String, Value> = BTreeMap::new();
                for key in rows.iter().filter_map(Value::as_object).flat_map(|m| m.keys()) {
                    if !columns.contains_key(key) {
                        let column = rows
                            .iter()
                            .map(|r| r.get(key).cloned().unwrap_or_default())
                            .collect();
                        columns.insert(key.clone(), Value::array(column));
                    }
                }
                Ok(Value::from_map(columns))
            } else {
                let found = rows
                    .iter()
                    .find(|r| !matches!(r, Value::Array(_) | Value::Object(_)))
                    .map_or("mixed array", Value::kind_name);
                Err(ParseErrorKind::InvalidPivot { found })
            }
        }
        Value::Object(columns) => {
            let mut height = 0;
            for column in columns.values() {
                match column {
                    Value::Array(items) => height = height.max(items.len()),
                    other => {
                        return Err(ParseErrorKind::InvalidPivot {
                            found: other.kind_name(),
                        })
                    }
                }
            }
            let rows = (0..height)
                .map(|i| {
                    Value::from_map(
                        columns
                            .iter()
                            .map(|(k, col)| (k.clone(), col.get_index(i).cloned().unwrap_or_default()))
                            .collect(),
                    )
                })
                .collect();
            Ok(Value::array(rows))
        }
        other => Err(ParseErrorKind::InvalidPivot {
            found: other.kind_name(),
        }),
    }
}

/// Evaluate grammar constants in declaration order
///
/// Each constant may use the ones before it and any configured callback.
pub fn evaluate_constants(vars: &[VarNode], callbacks: &Callbacks) -> Result<Constants, GrammarError> {
    let mut constants = Constants::default();
    let empty = InputBuffer::complete("");
    let scope = OutputScope {
        slots: &[],
        start: 0,
        end: 0,
        buffer: &empty,
    };

    for var in vars {
        let f = OutputCompiler::new(&constants, callbacks, &[]).compile(&var.value);
        let value = f(&scope).map_err(|err| GrammarError::InvalidConstant {
            name: var.name.clone(),
            reason: err.to_string(),
        })?;
        constants.insert(var.name.clone(), value);
    }
    Ok(constants)
}

/// Assemble a rule's capture slots from captures recorded in match order
///
/// Single-valued slots keep their last capture (null when never reached);
/// array-valued slots collect every capture in order. Captures are moved
/// into their slots.
pub fn assemble_slots(layout: &[bool], captures: impl IntoIterator<Item = (usize, Value)>) -> Vec<Value> {
    let mut single: Vec<Value> = vec![Value::Null; layout.len()];
    let mut repeated: Vec<Vec<Value>> = vec![Vec::new(); layout.len()];

    for (slot, value) in captures {
        let Some(idx) = slot.checked_sub(1) else {
            continue;
        };
        match layout.get(idx) {
            Some(true) => repeated[idx].push(value),
            Some(false) => single[idx] = value,
            None => {}
        }
    }

    layout
        .iter()
        .zip(single.into_iter().zip(repeated))
        .map(|(&is_array, (one, many))| if is_array { Value::array(many) } else { one })
        .collect()
}
