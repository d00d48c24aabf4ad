//! Op compiler and op execution
//!
//! The annotated grammar is compiled into a flat arena of [`Op`]s addressed
//! by [`OpId`]. Every op that can branch names both continuations, so PEG
//! backtracking is resolved entirely through the graph:
//!
//! | construct       | ops                                                    |
//! |-----------------|--------------------------------------------------------|
//! | sequence        | `Enter` → tokens → `Commit`, any failure → `Rollback`  |
//! | ordered choice  | alternative *i* fails into alternative *i + 1*         |
//! | `x?`            | failure of `x` → `PushNulls` → pass                    |
//! | `x*` / `x+`     | `RepeatEnter` → `x` → `RepeatNext` ↺, failure → `RepeatExit` |
//! | `&x` / `!x`     | `PredicateEnter` → `x` → `PredicateExit` (targets swapped for `!`) |
//! | `{ ... }`       | `CaptureStart` → choice → `CaptureEnd` / `CaptureFail` |
//! | rule reference  | `Call` → ruleset entry → `RuleOutput` → `Return` / `ReturnFail` |
//!
//! The graph is compiled right to left: each construct is built after the
//! ops it continues into, so targets are known up front. The only cycle,
//! the repeat loop, reserves its `RepeatNext` slot and patches it once the
//! loop body exists.
//!
//! Every descriptor is atomic on failure: when it takes its `fail` target
//! the position and capture list are as they were before it started.

use super::buffer::{BufferError, InputBuffer};
use super::context::{Capture, Context, Frame, Loop, Scope, Status};
use super::output::{assemble_slots, Constants, OutputCompiler, OutputFn, OutputScope};
use crate::error::ParseErrorKind;
use crate::grammar::terminal::{Terminal, TerminalMatcher};
use crate::grammar::{CompiledGrammar, Descriptor, PatternNode, TokenNode};
use crate::parser::Callbacks;
use crate::value::Value;
use std::fmt;

/// Index of an op in a [`Program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(u32);

impl OpId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One step of the matching state machine
///
/// `next`, `pass` and `fail` name the op that runs after this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Open a backtrack scope
    Enter {
        /// First op inside the scope
        next: OpId,
    },
    /// Close the innermost scope, keeping its progress
    Commit {
        /// Continuation after the scope
        next: OpId,
    },
    /// Close the innermost scope, restoring position and captures
    Rollback {
        /// Continuation after the restore
        next: OpId,
    },
    /// Open a lookahead scope
    PredicateEnter {
        /// First op of the predicate body
        next: OpId,
    },
    /// Close a lookahead scope, always restoring position and captures
    PredicateExit {
        /// Continuation after the restore
        next: OpId,
    },
    /// Record null placeholders for the slots of a skipped optional token
    PushNulls {
        /// Capture slots that receive a null
        slots: Box<[usize]>,
        /// Continuation after the placeholders
        next: OpId,
    },
    /// Start a `*`/`+` loop
    RepeatEnter {
        /// First op of the loop body
        body: OpId,
    },
    /// One iteration matched; loop again unless it consumed nothing
    RepeatNext {
        /// First op of the loop body
        body: OpId,
        /// Iterations required for the loop to pass
        min: u32,
        /// Taken when a zero-width iteration ends a satisfied loop
        pass: OpId,
        /// Taken when a zero-width iteration ends the loop short of `min`
        fail: OpId,
    },
    /// An iteration failed; the loop passes if it ran `min` times
    RepeatExit {
        /// Iterations required for the loop to pass
        min: u32,
        /// Taken when at least `min` iterations matched
        pass: OpId,
        /// Taken otherwise
        fail: OpId,
    },
    /// Remember where a capture starts
    CaptureStart {
        /// First op of the captured pattern
        next: OpId,
    },
    /// Record the captured text, or the output of the rule it wraps
    CaptureEnd {
        /// Slot the capture fills, counted from 1
        slot: usize,
        /// Take the rule output instead of the matched text
        from_rule: bool,
        /// Continuation after the capture
        next: OpId,
    },
    /// Discard the start of a failed capture
    CaptureFail {
        /// Failure continuation of the capture
        next: OpId,
    },
    /// Match a terminal
    Terminal {
        /// Index into the program's terminal table
        terminal: usize,
        /// Taken after the terminal matched and advanced the position
        pass: OpId,
        /// Taken when the terminal cannot match
        fail: OpId,
    },
    /// Invoke a ruleset
    Call {
        /// Index of the called ruleset
        ruleset: usize,
        /// Taken after the ruleset returns with a result
        pass: OpId,
        /// Taken after every alternative of the ruleset failed
        fail: OpId,
    },
    /// Build the output of a matched rule alternative
    RuleOutput {
        /// Index of the compiled rule
        rule: usize,
        /// Continuation after the output is built
        next: OpId,
    },
    /// Leave the current ruleset successfully
    Return,
    /// Leave the current ruleset after all alternatives failed
    ReturnFail,
    /// The whole grammar matched
    Accept,
    /// The whole grammar failed
    Reject,
}

struct CompiledRule {
    layout: Box<[bool]>,
    output: OutputFn,
}

/// The compiled, read-only form of a grammar
pub struct Program {
    ops: Vec<Op>,
    entries: Vec<OpId>,
    root: OpId,
    rules: Vec<CompiledRule>,
    terminals: Vec<Terminal>,
    ruleset_names: Vec<String>,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("ops", &self.ops.len())
            .field("rules", &self.rules.len())
            .field("terminals", &self.terminals.len())
            .field("rulesets", &self.ruleset_names)
            .finish()
    }
}

impl Program {
    /// Compile an annotated grammar
    pub fn build(compiled: &CompiledGrammar, constants: &Constants, callbacks: &Callbacks) -> Self {
        let mut builder = Builder { ops: Vec::new() };
        let ret = builder.push(Op::Return);
        let ret_fail = builder.push(Op::ReturnFail);

        let mut rules = Vec::new();
        let mut entries = Vec::with_capacity(compiled.grammar.rulesets.len());
        for ruleset in &compiled.grammar.rulesets {
            let first_rule = rules.len();
            for rule in &ruleset.rules {
                let output_compiler = OutputCompiler::new(constants, callbacks, &rule.captures);
                let output = match &rule.output {
                    Some(template) => output_compiler.compile(template),
                    None => OutputCompiler::matched_text(),
                };
                rules.push(CompiledRule {
                    layout: rule.captures.clone().into_boxed_slice(),
                    output,
                });
            }

            let mut fail = ret_fail;
            for (offset, rule) in ruleset.rules.iter().enumerate().rev() {
                let output = builder.push(Op::RuleOutput {
                    rule: first_rule + offset,
                    next: ret,
                });
                fail = builder.choice(&rule.patterns, output, fail);
            }
            entries.push(fail);
        }

        let accept = builder.push(Op::Accept);
        let reject = builder.push(Op::Reject);
        let root = builder.push(Op::Call {
            ruleset: compiled.return_index,
            pass: accept,
            fail: reject,
        });

        log_debug!(
            "compiled {} ops for {} rules",
            builder.ops.len(),
            rules.len()
        );

        Self {
            ops: builder.ops,
            entries,
            root,
            rules,
            terminals: compiled.terminals.clone(),
            ruleset_names: compiled
                .grammar
                .rulesets
                .iter()
                .map(|r| r.name.clone())
                .collect(),
        }
    }

    /// Entry op of a parse
    #[inline]
    pub fn root(&self) -> OpId {
        self.root
    }

    /// Look up an op
    #[inline]
    pub fn op(&self, id: OpId) -> Option<&Op> {
        self.ops.get(id.index())
    }

    /// Number of ops
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the program has no ops
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Look up a terminal
    #[inline]
    pub fn terminal(&self, id: usize) -> Option<&Terminal> {
        self.terminals.get(id)
    }

    /// Ruleset names in declaration order
    pub fn ruleset_names(&self) -> &[String] {
        &self.ruleset_names
    }
}

struct Builder {
    ops: Vec<Op>,
}

impl Builder {
    fn push(&mut self, op: Op) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(op);
        id
    }

    /// Reserve a slot to be filled by [`Builder::patch`]
    fn reserve(&mut self) -> OpId {
        self.push(Op::Reject)
    }

    fn patch(&mut self, id: OpId, op: Op) {
        self.ops[id.index()] = op;
    }

    fn choice(&mut self, patterns: &[PatternNode], pass: OpId, fail: OpId) -> OpId {
        patterns
            .iter()
            .rev()
            .fold(fail, |fail, pattern| self.sequence(pattern, pass, fail))
    }

    fn sequence(&mut self, pattern: &PatternNode, pass: OpId, fail: OpId) -> OpId {
        match pattern.tokens.as_slice() {
            [] => pass,
            // Tokens are atomic on failure; a lone one needs no scope
            [token] => self.token(token, pass, fail),
            tokens => {
                let rollback = self.push(Op::Rollback { next: fail });
                let mut next = self.push(Op::Commit { next: pass });
                for token in tokens.iter().rev() {
                    next = self.token(token, next, rollback);
                }
                self.push(Op::Enter { next })
            }
        }
    }

    fn token(&mut self, token: &TokenNode, pass: OpId, fail: OpId) -> OpId {
        if !token.is_predicate() {
            return self.quantified(token, pass, fail);
        }
        let exit_pass = self.push(Op::PredicateExit { next: pass });
        let exit_fail = self.push(Op::PredicateExit { next: fail });
        let inner = if token.and {
            self.quantified(token, exit_pass, exit_fail)
        } else {
            self.quantified(token, exit_fail, exit_pass)
        };
        self.push(Op::PredicateEnter { next: inner })
    }

    fn quantified(&mut self, token: &TokenNode, pass: OpId, fail: OpId) -> OpId {
        match (token.required, token.repeat) {
            (true, false) => self.descriptor(&token.descriptor, pass, fail),
            (false, false) => {
                let slots = token.descriptor.capture_slots();
                let skip = if slots.is_empty() {
                    pass
                } else {
                    self.push(Op::PushNulls {
                        slots: slots.into_boxed_slice(),
                        next: pass,
                    })
                };
                self.descriptor(&token.descriptor, pass, skip)
            }
            (required, true) => {
                let min = u32::from(required);
                let exit = self.push(Op::RepeatExit { min, pass, fail });
                let next = self.reserve();
                let body = self.descriptor(&token.descriptor, next, exit);
                self.patch(
                    next,
                    Op::RepeatNext {
                        body,
                        min,
                        pass,
                        fail,
                    },
                );
                self.push(Op::RepeatEnter { body })
            }
        }
    }

    fn descriptor(&mut self, descriptor: &Descriptor, pass: OpId, fail: OpId) -> OpId {
        match descriptor {
            Descriptor::String { terminal, .. }
            | Descriptor::Class { terminal, .. }
            | Descriptor::Any { terminal } => match terminal {
                Some(terminal) => self.push(Op::Terminal {
                    terminal: *terminal,
                    pass,
                    fail,
                }),
                // Unannotated terminals never match
                None => fail,
            },
            Descriptor::RuleRef { target, .. } => match target {
                Some(ruleset) => self.push(Op::Call {
                    ruleset: *ruleset,
                    pass,
                    fail,
                }),
                None => fail,
            },
            Descriptor::Group { patterns } => self.choice(patterns, pass, fail),
            Descriptor::Capture { patterns, slot } => {
                let end = self.push(Op::CaptureEnd {
                    slot: *slot,
                    from_rule: is_rule_capture(patterns),
                    next: pass,
                });
                let abort = self.push(Op::CaptureFail { next: fail });
                let body = self.choice(patterns, end, abort);
                self.push(Op::CaptureStart { next: body })
            }
        }
    }
}

/// A capture whose sole content is one plain rule reference records that
/// rule's output instead of its text
fn is_rule_capture(patterns: &[PatternNode]) -> bool {
    match patterns {
        [pattern] => match pattern.tokens.as_slice() {
            [token] => {
                token.required
                    && !token.repeat
                    && !token.is_predicate()
                    && matches!(token.descriptor, Descriptor::RuleRef { .. })
            }
            _ => false,
        },
        _ => false,
    }
}

fn internal(what: &str) -> ParseErrorKind {
    ParseErrorKind::Internal(what.to_string())
}

/// Execute one op and return the next, or `None` when the run ends
///
/// A run ends when the program accepts or rejects, or when a terminal needs
/// input the buffer does not hold yet; in that case the terminal itself is
/// left pending in the context.
pub(crate) fn execute(
    id: OpId,
    ctx: &mut Context,
    program: &Program,
    buffer: &InputBuffer,
) -> Result<Option<OpId>, ParseErrorKind> {
    let op = program.op(id).ok_or_else(|| internal("op index out of range"))?;

    let next = match op {
        Op::Enter { next } => {
            ctx.scopes.push(Scope {
                pos: ctx.pos,
                captures: ctx.captures.len(),
            });
            *next
        }
        Op::Commit { next } => {
            ctx.pop_scope()?;
            *next
        }
        Op::Rollback { next } => {
            let scope = ctx.pop_scope()?;
            ctx.restore(scope);
            *next
        }
        Op::PredicateEnter { next } => {
            ctx.scopes.push(Scope {
                pos: ctx.pos,
                captures: ctx.captures.len(),
            });
            ctx.quiet += 1;
            *next
        }
        Op::PredicateExit { next } => {
            let scope = ctx.pop_scope()?;
            ctx.restore(scope);
            ctx.quiet = ctx
                .quiet
                .checked_sub(1)
                .ok_or_else(|| internal("predicate nesting underflow"))?;
            *next
        }
        Op::PushNulls { slots, next } => {
            ctx.captures.extend(slots.iter().map(|&slot| Capture {
                slot,
                value: Value::Null,
            }));
            *next
        }
        Op::RepeatEnter { body } => {
            ctx.loops.push(Loop {
                count: 0,
                start: ctx.pos,
                captures: ctx.captures.len(),
            });
            *body
        }
        Op::RepeatNext {
            body,
            min,
            pass,
            fail,
        } => {
            let pos = ctx.pos;
            let current = ctx.loops.last_mut().ok_or_else(|| internal("loop underflow"))?;
            if pos == current.start {
                // A zero-width iteration ends the loop as if it had failed
                let captures = current.captures;
                ctx.captures.truncate(captures);
                exit_loop(ctx, *min, *pass, *fail)?
            } else {
                current.count = current.count.saturating_add(1);
                current.start = pos;
                current.captures = ctx.captures.len();
                *body
            }
        }
        Op::RepeatExit { min, pass, fail } => exit_loop(ctx, *min, *pass, *fail)?,
        Op::CaptureStart { next } => {
            ctx.capture_starts.push(ctx.pos);
            *next
        }
        Op::CaptureEnd {
            slot,
            from_rule,
            next,
        } => {
            let start = ctx
                .capture_starts
                .pop()
                .ok_or_else(|| internal("capture nesting underflow"))?;
            let value = if *from_rule {
                ctx.result.take().unwrap_or_default()
            } else {
                Value::String(buffer.substr_exact(start, ctx.pos - start)?.into_owned())
            };
            ctx.captures.push(Capture { slot: *slot, value });
            *next
        }
        Op::CaptureFail { next } => {
            ctx.capture_starts
                .pop()
                .ok_or_else(|| internal("capture nesting underflow"))?;
            *next
        }
        Op::Terminal {
            terminal,
            pass,
            fail,
        } => {
            let matcher = program
                .terminal(*terminal)
                .ok_or_else(|| internal("terminal index out of range"))?;
            match match_terminal(matcher, buffer, ctx.pos) {
                Ok(Some(len)) => {
                    ctx.pos += len;
                    *pass
                }
                Ok(None) | Err(BufferError::EndOfInput) => {
                    ctx.record_failure(*terminal);
                    *fail
                }
                Err(BufferError::NeedInput) => {
                    ctx.status = Status::WaitInput;
                    ctx.pending = Some(id);
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Op::Call {
            ruleset,
            pass,
            fail,
        } => call(ctx, program, *ruleset, *pass, *fail)?,
        Op::RuleOutput { rule, next } => {
            let frame = ctx.frame()?;
            let (start, base) = (frame.start, frame.capture_base);
            let compiled = program
                .rules
                .get(*rule)
                .ok_or_else(|| internal("rule index out of range"))?;
            if base > ctx.captures.len() {
                return Err(internal("capture base past end of captures"));
            }
            let slots = assemble_slots(
                &compiled.layout,
                ctx.captures.drain(base..).map(|c| (c.slot, c.value)),
            );
            let value = (compiled.output)(&OutputScope {
                slots: &slots,
                start,
                end: ctx.pos,
                buffer,
            })?;
            ctx.result = Some(value);
            *next
        }
        Op::Return => return_success(ctx, program)?,
        Op::ReturnFail => {
            let frame = ctx.frames.pop().ok_or_else(|| internal("call frame underflow"))?;
            ctx.captures.truncate(frame.capture_base);
            match frame.best {
                // A failed growth round falls back to the best seed
                Some((value, end)) => {
                    log_debug!(
                        "left recursion in `{}` at {} settled after {} round(s)",
                        program.ruleset_names[frame.ruleset],
                        frame.start,
                        frame.rounds
                    );
                    ctx.pos = end;
                    ctx.result = Some(value);
                    frame.pass
                }
                None => {
                    ctx.pos = frame.start;
                    frame.fail
                }
            }
        }
        Op::Accept => {
            ctx.status = Status::Pass;
            ctx.output = Some(ctx.result.take().unwrap_or_default());
            log_debug!("parse passed at {}", ctx.pos);
            return Ok(None);
        }
        Op::Reject => {
            ctx.status = Status::Fail;
            log_debug!("parse failed; furthest position {}", ctx.furthest);
            return Ok(None);
        }
    };
    Ok(Some(next))
}

fn exit_loop(ctx: &mut Context, min: u32, pass: OpId, fail: OpId) -> Result<OpId, ParseErrorKind> {
    let finished = ctx.loops.pop().ok_or_else(|| internal("loop underflow"))?;
    Ok(if finished.count >= min { pass } else { fail })
}

fn match_terminal(terminal: &Terminal, buffer: &InputBuffer, pos: usize) -> Result<Option<usize>, BufferError> {
    match &terminal.matcher {
        TerminalMatcher::Literal(text) => {
            Ok(buffer.starts_with(pos, text)?.then_some(text.len()))
        }
        TerminalMatcher::Class(_) | TerminalMatcher::Any => {
            let c = buffer.char_at(pos)?;
            Ok(terminal.accepts_char(c).then(|| c.len_utf8()))
        }
    }
}

fn call(
    ctx: &mut Context,
    program: &Program,
    ruleset: usize,
    pass: OpId,
    fail: OpId,
) -> Result<OpId, ParseErrorKind> {
    let pos = ctx.pos;
    if let Some(frame) = ctx
        .frames
        .iter_mut()
        .rev()
        .find(|f| f.ruleset == ruleset && f.start == pos)
    {
        // Re-entered without consuming input: answer with the current seed.
        // Cloning the seed shares its containers.
        frame.left_recursive = true;
        return Ok(match &frame.best {
            Some((value, end)) => {
                ctx.result = Some(value.clone());
                ctx.pos = *end;
                pass
            }
            None => fail,
        });
    }

    let entry = *program
        .entries
        .get(ruleset)
        .ok_or_else(|| internal("ruleset index out of range"))?;
    ctx.frames.push(Frame {
        ruleset,
        pass,
        fail,
        start: pos,
        capture_base: ctx.captures.len(),
        left_recursive: false,
        best: None,
        rounds: 0,
    });
    Ok(entry)
}

fn return_success(ctx: &mut Context, program: &Program) -> Result<OpId, ParseErrorKind> {
    let end = ctx.pos;
    let frame = ctx.frames.last_mut().ok_or_else(|| internal("call frame underflow"))?;

    if !frame.left_recursive {
        let pass = frame.pass;
        ctx.frames.pop();
        return Ok(pass);
    }

    let improved = frame.best.as_ref().map_or(true, |(_, best_end)| end > *best_end);
    if improved {
        // Grow the seed: retry the ruleset with this result as the recursive answer
        frame.best = Some((ctx.result.take().unwrap_or_default(), end));
        frame.rounds += 1;
        log_debug!(
            "left recursion in `{}` at {} grew to {} (round {})",
            program.ruleset_names[frame.ruleset],
            frame.start,
            end,
            frame.rounds
        );
        let (start, base, ruleset) = (frame.start, frame.capture_base, frame.ruleset);
        ctx.pos = start;
        ctx.captures.truncate(base);
        return program
            .entries
            .get(ruleset)
            .copied()
            .ok_or_else(|| internal("ruleset index out of range"));
    }

    let frame = ctx.frames.pop().ok_or_else(|| internal("call frame underflow"))?;
    let (value, best_end) = frame.best.unwrap_or_default();
    ctx.pos = best_end;
    ctx.result = Some(value);
    Ok(frame.pass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::compiler::compile;
    use crate::grammar::dsl::*;
    use crate::grammar::Grammar;

    fn program(grammar: Grammar) -> Program {
        let callbacks = Callbacks::default();
        let compiled = compile(grammar, &callbacks).unwrap();
        Program::build(&compiled, &Constants::default(), &callbacks)
    }

    fn run_complete(program: &Program, text: &str) -> (Status, Context) {
        let buffer = InputBuffer::complete(text);
        let mut ctx = Context::new(program);
        let status = ctx.run(program, &buffer).unwrap();
        (status, ctx)
    }

    #[test]
    fn test_single_token_pattern_has_no_scope() {
        let p = program(
            GrammarBuilder::new()
                .ruleset("return", vec![rule_text(vec![seq(vec![lit("a")])])])
                .build(),
        );
        assert!(!p.ops.iter().any(|op| matches!(op, Op::Enter { .. })));
    }

    #[test]
    fn test_repeat_loop_is_patched() {
        let p = program(
            GrammarBuilder::new()
                .ruleset("return", vec![rule_text(vec![seq(vec![lit("a").star()])])])
                .build(),
        );
        let next = p
            .ops
            .iter()
            .find_map(|op| match op {
                Op::RepeatNext { body, .. } => Some(*body),
                _ => None,
            })
            .unwrap();
        assert!(matches!(p.op(next), Some(Op::Terminal { .. })));
    }

    #[test]
    fn test_accept_and_reject() {
        let p = program(
            GrammarBuilder::new()
                .ruleset("return", vec![rule_text(vec![seq(vec![lit("ab"), class("[0-9]").plus()])])])
                .build(),
        );
        let (status, ctx) = run_complete(&p, "ab12");
        assert_eq!(status, Status::Pass);
        assert_eq!(ctx.output(), Some(&Value::from("ab12")));
        assert_eq!(ctx.position(), 4);

        let (status, ctx) = run_complete(&p, "abx");
        assert_eq!(status, Status::Fail);
        assert_eq!(ctx.furthest(), 2);
        assert_eq!(ctx.expected(&p), vec!["[0-9]".to_string()]);
    }

    #[test]
    fn test_suspends_on_terminal_and_resumes() {
        let p = program(
            GrammarBuilder::new()
                .ruleset("return", vec![rule_text(vec![seq(vec![lit("hello")])])])
                .build(),
        );
        let mut buffer = InputBuffer::new(usize::MAX);
        let mut ctx = Context::new(&p);

        buffer.append("hel").unwrap();
        assert_eq!(ctx.run(&p, &buffer), Ok(Status::WaitInput));
        let pending = ctx.pending;
        assert!(matches!(pending.and_then(|id| p.op(id)), Some(Op::Terminal { .. })));

        buffer.append("lo").unwrap();
        assert_eq!(ctx.run(&p, &buffer), Ok(Status::Pass));
        assert_eq!(ctx.output(), Some(&Value::from("hello")));
    }

    #[test]
    fn test_zero_width_iteration_terminates() {
        // ('x'?)* would loop forever without the zero-width check
        let p = program(
            GrammarBuilder::new()
                .ruleset(
                    "return",
                    vec![rule_text(vec![seq(vec![
                        group(vec![seq(vec![lit("x").opt()])]).star(),
                        lit("y"),
                    ])])],
                )
                .build(),
        );
        let (status, ctx) = run_complete(&p, "xxy");
        assert_eq!(status, Status::Pass);
        assert_eq!(ctx.output(), Some(&Value::from("xxy")));
    }

    #[test]
    fn test_left_recursion_grows_seed() {
        let p = program(
            GrammarBuilder::new()
                .ruleset("return", vec![rule(vec![seq(vec![capture_ref("expr")])], back(1))])
                .ruleset(
                    "expr",
                    vec![
                        rule(
                            vec![seq(vec![capture_ref("expr"), lit("-"), capture_ref("num")])],
                            array(vec![text("-"), back(1), back(2)]),
                        ),
                        rule(vec![seq(vec![capture_ref("num")])], back(1)),
                    ],
                )
                .ruleset("num", vec![rule_text(vec![seq(vec![class("[0-9]")])])])
                .build(),
        );
        let (status, ctx) = run_complete(&p, "7-2-1");
        assert_eq!(status, Status::Pass);
        assert_eq!(
            ctx.output().map(ToString::to_string),
            Some(r#"["-", ["-", "7", "2"], "1"]"#.to_string())
        );
        assert!(ctx.frames.is_empty());
        assert!(ctx.scopes.is_empty());
        assert!(ctx.loops.is_empty());
    }

    #[test]
    fn test_predicate_does_not_record_expected() {
        let p = program(
            GrammarBuilder::new()
                .ruleset("return", vec![rule_text(vec![seq(vec![lit("a").not(), any()])])])
                .build(),
        );
        let (status, ctx) = run_complete(&p, "a");
        assert_eq!(status, Status::Fail);
        assert!(ctx.expected(&p).is_empty());
        assert_eq!(ctx.quiet, 0);
    }
}
