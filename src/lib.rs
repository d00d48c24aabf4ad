//! Pegstream - streaming PEG parser with output templates
//!
//! A grammar is a set of rulesets. Each rule alternative pairs a pattern
//! (literals, character classes, rule references, predicates, repetition,
//! ordered choice and captures) with an output template that builds a
//! [`Value`] from the captures. The crate provides:
//! - A grammar compiler that validates and annotates grammars
//! - An op-graph matcher that can suspend mid-token and resume when more
//!   input arrives
//! - Left recursion through seed growing
//! - A chunked input buffer with a bounded retention window
//! - A fluent DSL and JSON interchange for grammars
//!
//! ## Quick Start
//!
//! ```rust
//! use pegstream::prelude::*;
//!
//! // expr = {expr} '+' {num} -> ['+', $1, $2], {num} -> $1;
//! let grammar = GrammarBuilder::new()
//!     .ruleset("return", vec![rule(vec![seq(vec![capture_ref("expr")])], back(1))])
//!     .ruleset("expr", vec![
//!         rule(
//!             vec![seq(vec![capture_ref("expr"), lit("+"), capture_ref("num")])],
//!             array(vec![text("+"), back(1), back(2)]),
//!         ),
//!         rule(vec![seq(vec![capture_ref("num")])], back(1)),
//!     ])
//!     .ruleset("num", vec![rule_text(vec![seq(vec![class("[0-9]").plus()])])])
//!     .build();
//!
//! let parser = Parser::new(grammar).unwrap();
//! let value = parser.parse("5+4+3").unwrap();
//! assert_eq!(value.to_string(), r#"["+", ["+", "5", "4"], "3"]"#);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]
#![allow(clippy::redundant_closure)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

pub mod prelude;

pub mod engine;
pub mod error;
pub mod grammar;
pub mod parser;
pub mod source_location;
pub mod value;

pub use engine::{InputBuffer, Status};
pub use error::{AccessError, GrammarError, ParseError, ParseErrorKind};
pub use grammar::{CompiledGrammar, Grammar, GrammarWarning, WarningKind};
pub use parser::{Callback, Callbacks, ParseStream, Parser, ParserConfig};
pub use source_location::SourcePosition;
pub use value::Value;
