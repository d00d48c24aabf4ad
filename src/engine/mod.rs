//! Matching engine
//!
//! - [`buffer`]: the chunked input stream
//! - [`ops`]: the op graph compiled from a grammar, and how each op runs
//! - [`output`]: compiled output templates
//! - [`context`]: per-parse state and the interpreter loop

pub mod buffer;
pub mod context;
pub mod ops;
pub mod output;

pub use buffer::{BufferError, InputBuffer};
pub use context::{Context, Status};
pub use ops::{Op, OpId, Program};
pub use output::{pivot, Constants, OutputScope};
