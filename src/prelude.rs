//! Prelude module for convenient imports
//!
//! ```
//! use pegstream::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Grammar`] - Grammar data model
//! - [`Parser`] - Compiled grammar, ready to parse
//! - [`ParserConfig`] - Retention window and callbacks
//! - [`ParseStream`] - One in-flight streaming parse
//! - [`Status`] - Interpreter status after a write
//! - [`Value`] - Output value
//!
//! ## Grammar DSL
//! - [`GrammarBuilder`] and the pattern, rule and template helpers of
//!   [`crate::grammar::dsl`]
//!
//! ## Errors
//! - [`GrammarError`] - Compile-time grammar error
//! - [`ParseError`] / [`ParseErrorKind`] - Run-time parse error

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::Status;
pub use crate::grammar::Grammar;
pub use crate::parser::{ParseStream, Parser, ParserConfig};
pub use crate::value::Value;

// ============================================================================
// Grammar DSL
// ============================================================================

pub use crate::grammar::dsl::{
    any, array, back, boolean, call, capture, capture_ref, class, float, group, int, length, lit,
    literal, merge, null, object, pair, pivot, position, rule, rule_ref, rule_text, seq, spread,
    text, var, GrammarBuilder,
};

// ============================================================================
// Errors
// ============================================================================

pub use crate::error::{GrammarError, ParseError, ParseErrorKind};
