//! Parse context and interpreter loop
//!
//! A [`Context`] holds every piece of mutable state of one parse: the input
//! position, backtrack scopes, captures, active loops, call frames and the
//! single pending operation. The compiled [`Program`] is never mutated, so
//! one program can drive any number of contexts.
//!
//! Suspension is just returning: when a terminal needs input that has not
//! arrived, the context records that terminal as the pending op and the
//! loop ends with [`Status::WaitInput`]. Running again after more input
//! resumes exactly there.

use super::buffer::InputBuffer;
use super::ops::{self, OpId, Program};
use crate::error::ParseErrorKind;
use crate::value::Value;
use hashbrown::HashSet;

/// Interpreter status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Runnable; not yet started or mid-run
    Run,
    /// The grammar matched; the output is ready
    Pass,
    /// The grammar rejected the input
    Fail,
    /// Suspended until more input arrives
    WaitInput,
}

/// Backtrack checkpoint
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
    pub pos: usize,
    pub captures: usize,
}

/// A recorded capture, tagged with its slot
#[derive(Debug, Clone)]
pub(crate) struct Capture {
    pub slot: usize,
    pub value: Value,
}

/// State of an active `*`/`+` loop
#[derive(Debug, Clone, Copy)]
pub(crate) struct Loop {
    pub count: u32,
    /// Position where the current iteration began
    pub start: usize,
    /// Capture count when the current iteration began
    pub captures: usize,
}

/// One ruleset invocation
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub ruleset: usize,
    pub pass: OpId,
    pub fail: OpId,
    pub start: usize,
    pub capture_base: usize,
    /// Set when the ruleset was re-entered at `start` before finishing
    pub left_recursive: bool,
    /// Best seed so far: output and end position
    pub best: Option<(Value, usize)>,
    pub rounds: u32,
}

/// Mutable state of one parse
#[derive(Debug)]
pub struct Context {
    pub(crate) pos: usize,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) captures: Vec<Capture>,
    pub(crate) capture_starts: Vec<usize>,
    pub(crate) loops: Vec<Loop>,
    pub(crate) frames: Vec<Frame>,
    /// Nesting depth of predicates; failures inside are not diagnostics
    pub(crate) quiet: u32,
    /// Output of the most recently finished rule
    pub(crate) result: Option<Value>,
    pub(crate) status: Status,
    pub(crate) pending: Option<OpId>,
    pub(crate) output: Option<Value>,
    pub(crate) furthest: usize,
    pub(crate) expected: HashSet<usize, ahash::RandomState>,
}

impl Context {
    /// Fresh context positioned at the program's root
    pub fn new(program: &Program) -> Self {
        Self {
            pos: 0,
            scopes: Vec::new(),
            captures: Vec::new(),
            capture_starts: Vec::new(),
            loops: Vec::new(),
            frames: Vec::new(),
            quiet: 0,
            result: None,
            status: Status::Run,
            pending: Some(program.root()),
            output: None,
            furthest: 0,
            expected: HashSet::default(),
        }
    }

    /// Current status
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Current input position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Furthest position where a terminal failed
    #[inline]
    pub fn furthest(&self) -> usize {
        self.furthest
    }

    /// The built output, once the status is [`Status::Pass`]
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Run until the program passes, fails or needs more input
    pub fn run(&mut self, program: &Program, buffer: &InputBuffer) -> Result<Status, ParseErrorKind> {
        let mut next = self.pending.take();
        if next.is_some() {
            self.status = Status::Run;
        }
        while let Some(op) = next {
            next = ops::execute(op, self, program, buffer)?;
        }
        if self.status == Status::WaitInput {
            log_debug!("suspended at {} awaiting input", self.pos);
        }
        Ok(self.status)
    }

    /// Record a terminal failure for "expected" diagnostics
    pub(crate) fn record_failure(&mut self, terminal: usize) {
        if self.quiet > 0 {
            return;
        }
        if self.pos > self.furthest {
            self.furthest = self.pos;
            self.expected.clear();
        }
        if self.pos == self.furthest {
            self.expected.insert(terminal);
        }
    }

    /// Sorted, deduplicated descriptions of the terminals viable at the
    /// furthest failure position
    pub fn expected(&self, program: &Program) -> Vec<String> {
        let mut out: Vec<String> = self
            .expected
            .iter()
            .filter_map(|&t| program.terminal(t))
            .map(|t| t.description.clone())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub(crate) fn pop_scope(&mut self) -> Result<Scope, ParseErrorKind> {
        self.scopes
            .pop()
            .ok_or_else(|| ParseErrorKind::Internal("backtrack scope underflow".to_string()))
    }

    pub(crate) fn restore(&mut self, scope: Scope) {
        self.pos = scope.pos;
        self.captures.truncate(scope.captures);
    }

    pub(crate) fn frame(&self) -> Result<&Frame, ParseErrorKind> {
        self.frames
            .last()
            .ok_or_else(|| ParseErrorKind::Internal("call frame underflow".to_string()))
    }
}
