//! Public parsing interface
//!
//! A [`Parser`] owns a compiled grammar and can be shared freely: cloning it
//! is cheap and every parse gets its own [`ParseStream`] with a private
//! buffer and context.
//!
//! # Example
//!
//! ```rust
//! use pegstream::prelude::*;
//!
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
//! let parser = Parser::new(grammar).unwrap();
//!
//! let mut stream = parser.stream();
//! stream.write("Hello w").unwrap();
//! stream.write("orld!").unwrap();
//! let value = stream.close().unwrap();
//!
//! assert_eq!(value, parser.parse("Hello world!").unwrap());
//! ```

use crate::engine::buffer::InputBuffer;
use crate::engine::context::{Context, Status};
use crate::engine::ops::Program;
use crate::engine::output::evaluate_constants;
use crate::error::{GrammarError, ParseError, ParseErrorKind};
use crate::grammar::compiler::compile;
use crate::grammar::{Grammar, GrammarWarning};
use crate::source_location::pointer_text;
use crate::value::Value;
use std::fmt;
use std::io::{ErrorKind, Read};
use std::sync::Arc;

/// A host function callable from output templates
pub type Callback = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Callbacks by name
pub type Callbacks = hashbrown::HashMap<String, Callback, ahash::RandomState>;

/// Default retention window: 1 MB
pub const DEFAULT_MIN_BUFFER_SIZE: usize = 1024 * 1024;

/// Parser configuration
#[derive(Clone)]
pub struct ParserConfig {
    /// Bytes of already-consumed input kept available behind the newest chunk
    pub min_buffer_size: usize,
    /// Functions available to `call` template nodes
    pub callbacks: Callbacks,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_buffer_size: DEFAULT_MIN_BUFFER_SIZE,
            callbacks: Callbacks::default(),
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ParserConfig")
            .field("min_buffer_size", &self.min_buffer_size)
            .field("callbacks", &names)
            .finish()
    }
}

impl ParserConfig {
    /// Default configuration
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention window in bytes
    pub fn with_min_buffer_size(mut self, bytes: usize) -> Self {
        self.min_buffer_size = bytes;
        self
    }

    /// Set the retention window in megabytes
    pub fn with_min_buffer_size_in_mb(mut self, mb: usize) -> Self {
        self.min_buffer_size = mb.saturating_mul(1024 * 1024);
        self
    }

    /// Register a callback
    pub fn with_callback<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.callbacks.insert(name.to_string(), Arc::new(f));
        self
    }
}

/// A compiled grammar, ready to parse
#[derive(Clone)]
pub struct Parser {
    program: Arc<Program>,
    grammar: Arc<Grammar>,
    warnings: Arc<[GrammarWarning]>,
    min_buffer_size: usize,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("program", &self.program)
            .field("warnings", &self.warnings.len())
            .field("min_buffer_size", &self.min_buffer_size)
            .finish()
    }
}

impl Parser {
    /// Compile a grammar with the default configuration
    pub fn new(grammar: Grammar) -> Result<Self, GrammarError> {
        Self::with_config(grammar, ParserConfig::default())
    }

    /// Compile a grammar
    ///
    /// Every grammar error is reported here; a parser that was built never
    /// raises a [`GrammarError`] later.
    pub fn with_config(grammar: Grammar, config: ParserConfig) -> Result<Self, GrammarError> {
        let compiled = compile(grammar, &config.callbacks)?;
        let constants = evaluate_constants(&compiled.grammar.vars, &config.callbacks)?;
        let program = Program::build(&compiled, &constants, &config.callbacks);

        Ok(Self {
            program: Arc::new(program),
            warnings: compiled.warnings.into(),
            grammar: Arc::new(compiled.grammar),
            min_buffer_size: config.min_buffer_size,
        })
    }

    /// Start a streaming parse
    pub fn stream(&self) -> ParseStream {
        ParseStream::new(Arc::clone(&self.program), InputBuffer::new(self.min_buffer_size))
    }

    /// Parse a complete string
    pub fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut stream = ParseStream::new(Arc::clone(&self.program), InputBuffer::complete(text));
        stream.finish()
    }

    /// Parse everything `reader` yields, `chunk_size` bytes at a time
    pub fn parse_reader<R: Read>(&self, mut reader: R, chunk_size: usize) -> Result<Value, ParseError> {
        let mut stream = self.stream();
        let mut buf = vec![0u8; chunk_size.max(4)];
        // Bytes of a character split across reads
        let mut carry: Vec<u8> = Vec::new();

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(stream.fail(ParseErrorKind::Io(e.to_string()), stream.buffer.len())),
            };
            carry.extend_from_slice(&buf[..n]);

            let valid = match std::str::from_utf8(&carry) {
                Ok(_) => carry.len(),
                Err(e) if e.error_len().is_none() => e.valid_up_to(),
                Err(e) => {
                    let at = stream.buffer.len() + e.valid_up_to();
                    return Err(stream.fail(ParseErrorKind::Io(e.to_string()), at));
                }
            };
            if valid > 0 {
                let rest = carry.split_off(valid);
                let text = String::from_utf8(std::mem::replace(&mut carry, rest))
                    .map_err(|e| stream.fail(ParseErrorKind::Io(e.to_string()), stream.buffer.len()))?;
                stream.write(&text)?;
            }
        }

        if !carry.is_empty() {
            let at = stream.buffer.len();
            return Err(stream.fail(
                ParseErrorKind::Io("stream ended inside a UTF-8 sequence".to_string()),
                at,
            ));
        }
        stream.close()
    }

    /// Non-fatal findings from compilation
    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.warnings
    }

    /// Ruleset names in declaration order
    pub fn ruleset_names(&self) -> &[String] {
        self.program.ruleset_names()
    }

    /// The annotated grammar
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }
}

/// One in-flight parse fed by [`ParseStream::write`]
///
/// The first error is final: every later call returns it again.
#[derive(Debug)]
pub struct ParseStream {
    program: Arc<Program>,
    buffer: InputBuffer,
    ctx: Context,
    error: Option<ParseError>,
}

impl ParseStream {
    fn new(program: Arc<Program>, buffer: InputBuffer) -> Self {
        let ctx = Context::new(&program);
        log_debug!("parse started ({:?})", program);
        Self {
            program,
            buffer,
            ctx,
            error: None,
        }
    }

    /// Feed more text
    ///
    /// Fails immediately once the buffered text can no longer match.
    /// A grammar that has matched while text remains unread reports
    /// [`Status::WaitInput`]: only [`close`](Self::close) decides whether the
    /// leftover is an error.
    pub fn write(&mut self, chunk: &str) -> Result<Status, ParseError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.buffer.is_closed() {
            return Err(self.fail(ParseErrorKind::WriteAfterClose, self.buffer.len()));
        }
        if let Err(err) = self.buffer.append(chunk) {
            return Err(self.fail(err.into(), self.buffer.len()));
        }
        self.advance()
    }

    /// Signal end of input and return the output
    pub fn close(&mut self) -> Result<Value, ParseError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.buffer.close();
        self.finish()
    }

    fn finish(&mut self) -> Result<Value, ParseError> {
        match self.advance()? {
            Status::Pass => Ok(self.ctx.output().cloned().unwrap_or_default()),
            status => Err(self.fail(
                ParseErrorKind::Internal(format!("closed input left the parse in {:?}", status)),
                self.ctx.position(),
            )),
        }
    }

    fn advance(&mut self) -> Result<Status, ParseError> {
        if matches!(self.ctx.status(), Status::Run | Status::WaitInput) {
            if let Err(kind) = self.ctx.run(&self.program, &self.buffer) {
                return Err(self.fail(kind, self.ctx.position()));
            }
        }

        match self.ctx.status() {
            // More text may still arrive; only a closed buffer makes leftovers an error
            Status::Pass if self.ctx.position() < self.buffer.len() && self.buffer.is_closed() => {
                // A failure past the end of the match explains the leftover best
                let at = self.ctx.position().max(self.ctx.furthest());
                Err(self.fail(ParseErrorKind::UnconsumedInput, at))
            }
            Status::Fail => Err(self.fail(ParseErrorKind::NoMatch, self.ctx.furthest())),
            _ => Ok(self.status()),
        }
    }

    /// Record the final error of this stream
    fn fail(&mut self, kind: ParseErrorKind, position: usize) -> ParseError {
        let mut err = ParseError::new(kind, position);
        if let Ok((line, column)) = self.buffer.find_line_and_char(position) {
            err.line = Some(line);
            err.column = Some(column);
            err.pointer = self
                .buffer
                .line_text(position)
                .map(|text| pointer_text(&text, column));
        }
        if position == self.ctx.furthest() && !matches!(err.kind, ParseErrorKind::InputFreed { .. }) {
            err.expected = self.ctx.expected(&self.program);
        }
        log_debug!("parse error: {}", err);
        self.error = Some(err.clone());
        err
    }

    /// Current status
    ///
    /// A match followed by unread text on an open buffer is still waiting.
    pub fn status(&self) -> Status {
        match self.ctx.status() {
            Status::Pass if self.ctx.position() < self.buffer.len() && !self.buffer.is_closed() => {
                Status::WaitInput
            }
            status => status,
        }
    }

    /// Current input position
    pub fn position(&self) -> usize {
        self.ctx.position()
    }

    /// The input buffer
    pub fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::*;

    fn words() -> Grammar {
        GrammarBuilder::new()
            .ruleset(
                "return",
                vec![rule(
                    vec![seq(vec![
                        capture(vec![seq(vec![class("[a-z]").plus()])]),
                        lit(";"),
                    ])],
                    back(1),
                )],
            )
            .build()
    }

    #[test]
    fn test_config_builders() {
        let config = ParserConfig::new()
            .with_min_buffer_size_in_mb(2)
            .with_callback("id", |args: &[Value]| -> Result<Value, String> {
                Ok(args.first().cloned().unwrap_or_default())
            });
        assert_eq!(config.min_buffer_size, 2 * 1024 * 1024);
        assert!(config.callbacks.contains_key("id"));
        assert_eq!(ParserConfig::default().min_buffer_size, DEFAULT_MIN_BUFFER_SIZE);
        assert!(format!("{:?}", config).contains("\"id\""));
    }

    #[test]
    fn test_parse_whole_string() {
        let parser = Parser::new(words()).unwrap();
        assert_eq!(parser.parse("abc;").unwrap(), Value::from("abc"));
        assert_eq!(parser.ruleset_names(), &["return".to_string()]);
    }

    #[test]
    fn test_write_reports_status() {
        let parser = Parser::new(words()).unwrap();
        let mut stream = parser.stream();
        assert_eq!(stream.write("ab").unwrap(), Status::WaitInput);
        assert_eq!(stream.position(), 2);
        assert_eq!(stream.write("c;").unwrap(), Status::Pass);
        assert_eq!(stream.close().unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_write_fails_early() {
        let parser = Parser::new(words()).unwrap();
        let mut stream = parser.stream();
        let err = stream.write("ab1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NoMatch);
        assert_eq!(err.position, 2);
        // The error sticks
        assert_eq!(stream.write("more").unwrap_err(), err);
        assert_eq!(stream.close().unwrap_err(), err);
    }

    #[test]
    fn test_trailing_text_waits_for_close() {
        let parser = Parser::new(words()).unwrap();
        let mut stream = parser.stream();
        assert_eq!(stream.write("ab;x").unwrap(), Status::WaitInput);
        assert_eq!(stream.status(), Status::WaitInput);
        assert_eq!(stream.position(), 3);
        let err = stream.close().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnconsumedInput);
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_write_after_close() {
        let parser = Parser::new(words()).unwrap();
        let mut stream = parser.stream();
        stream.write("a;").unwrap();
        stream.close().unwrap();
        let err = stream.write("b").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::WriteAfterClose);
        assert_eq!(err.code(), 207);
    }

    #[test]
    fn test_parse_reader_splits_utf8() {
        let grammar = GrammarBuilder::new()
            .ruleset("return", vec![rule_text(vec![seq(vec![any().star()])])])
            .build();
        let parser = Parser::new(grammar).unwrap();
        let text = "héllo wörld ✓";
        let value = parser.parse_reader(text.as_bytes(), 1).unwrap();
        assert_eq!(value, Value::from(text));
    }

    #[test]
    fn test_parse_reader_invalid_utf8() {
        let grammar = GrammarBuilder::new()
            .ruleset("return", vec![rule_text(vec![seq(vec![any().star()])])])
            .build();
        let parser = Parser::new(grammar).unwrap();
        let err = parser.parse_reader(&b"ab\xffcd"[..], 8).unwrap_err();
        assert_eq!(err.code(), 208);
        let err = parser.parse_reader(&b"ab\xc3"[..], 8).unwrap_err();
        assert_eq!(err.code(), 208);
    }
}
