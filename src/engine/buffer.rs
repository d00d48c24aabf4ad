//! Streaming input buffer
//!
//! Text arrives in chunks of arbitrary size. The buffer presents them as one
//! continuous stream addressed by absolute byte offsets, independent of
//! where the chunk boundaries fall.
//!
//! # Retention
//!
//! Memory is bounded by evicting whole chunks from the front once the data
//! remaining after them is at least `min_retained` bytes. The newest chunk
//! is never evicted. Reading below the retained window fails with
//! [`BufferError::InputFreed`] instead of returning partial text.
//!
//! ```text
//!   evicted          retained window
//! [ chunk 0 ][ chunk 1 ][ chunk 2 ][ chunk 3 ]
//!            ^ retained_from               ^ len
//! ```

use crate::source_location::count_chars;
use std::borrow::Cow;
use std::collections::VecDeque;
use thiserror::Error;

/// Outcome of a read that could not be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The buffer is open and does not hold enough data yet
    #[error("more input is needed")]
    NeedInput,

    /// The buffer is closed and the read runs past its end
    #[error("end of input")]
    EndOfInput,

    /// The read starts below the retained window
    #[error("offset {offset} was freed (retained window starts at {retained_from})")]
    InputFreed {
        /// Requested offset
        offset: usize,
        /// First offset still retained
        retained_from: usize,
    },

    /// The offset is inside a multi-byte character
    #[error("offset {0} is not on a character boundary")]
    Misaligned(usize),

    /// `append` after `close`
    #[error("buffer is closed")]
    Closed,
}

#[derive(Debug)]
struct Chunk {
    offset: usize,
    text: String,
}

impl Chunk {
    #[inline]
    fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Append-only chunked text buffer with a bounded retained window
#[derive(Debug, Default)]
pub struct InputBuffer {
    chunks: VecDeque<Chunk>,
    start: usize,
    len: usize,
    closed: bool,
    min_retained: usize,
    /// Newlines seen in evicted text
    evicted_lines: usize,
    /// Characters between the last evicted newline and `start`
    evicted_column: usize,
}

impl InputBuffer {
    /// Create an open, empty buffer
    pub fn new(min_retained: usize) -> Self {
        Self {
            min_retained,
            ..Self::default()
        }
    }

    /// Create a closed buffer holding `text`
    pub fn complete(text: &str) -> Self {
        let mut buffer = Self::new(usize::MAX);
        // A fresh buffer is open, so neither call can fail
        let _ = buffer.append(text);
        buffer.close();
        buffer
    }

    /// Logical length: total bytes appended so far
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been appended
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First offset still held in memory
    #[inline]
    pub fn retained_from(&self) -> usize {
        self.start
    }

    /// Whether `close` has been called
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Signal that no more input will arrive
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Append a chunk and evict old chunks outside the retention window
    pub fn append(&mut self, text: &str) -> Result<(), BufferError> {
        if self.closed {
            return Err(BufferError::Closed);
        }
        if text.is_empty() {
            return Ok(());
        }
        self.chunks.push_back(Chunk {
            offset: self.len,
            text: text.to_owned(),
        });
        self.len += text.len();
        self.evict();
        Ok(())
    }

    fn evict(&mut self) {
        while self.chunks.len() > 1 {
            let front_len = self.chunks[0].text.len();
            if self.len - self.start - front_len < self.min_retained {
                break;
            }
            let Some(chunk) = self.chunks.pop_front() else {
                break;
            };
            let newlines = memchr::memchr_iter(b'\n', chunk.text.as_bytes()).count();
            if newlines > 0 {
                self.evicted_lines += newlines;
                let tail_from = memchr::memrchr(b'\n', chunk.text.as_bytes()).map_or(0, |n| n + 1);
                self.evicted_column = count_chars(&chunk.text.as_bytes()[tail_from..]);
            } else {
                self.evicted_column += count_chars(chunk.text.as_bytes());
            }
            self.start = chunk.end();
            log_debug!(
                "evicted chunk [{}, {}), retained window now starts at {}",
                chunk.offset,
                chunk.end(),
                self.start
            );
        }
    }

    fn check_retained(&self, pos: usize) -> Result<(), BufferError> {
        if pos < self.start {
            Err(BufferError::InputFreed {
                offset: pos,
                retained_from: self.start,
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn past_end(&self) -> BufferError {
        if self.closed {
            BufferError::EndOfInput
        } else {
            BufferError::NeedInput
        }
    }

    /// Index of the chunk holding `pos`; requires `start <= pos < len`
    #[inline]
    fn chunk_index(&self, pos: usize) -> usize {
        self.chunks.partition_point(|c| c.offset <= pos).saturating_sub(1)
    }

    /// Decode the character starting at `pos`
    pub fn char_at(&self, pos: usize) -> Result<char, BufferError> {
        self.check_retained(pos)?;
        if pos >= self.len {
            return Err(self.past_end());
        }
        let chunk = &self.chunks[self.chunk_index(pos)];
        let local = pos - chunk.offset;
        chunk
            .text
            .get(local..)
            .and_then(|rest| rest.chars().next())
            .ok_or(BufferError::Misaligned(pos))
    }

    /// Whether the input at `pos` starts with `literal`
    ///
    /// A mismatch is reported as soon as one byte differs, even if the buffer
    /// is still open. A matching but incomplete prefix needs more input on an
    /// open buffer and is a mismatch on a closed one.
    pub fn starts_with(&self, pos: usize, literal: &str) -> Result<bool, BufferError> {
        self.check_retained(pos)?;
        let wanted = literal.as_bytes();
        if wanted.is_empty() {
            return Ok(true);
        }

        let mut matched = 0;
        let mut at = pos;
        let mut idx = self.chunk_index(pos);
        while matched < wanted.len() && at < self.len {
            let chunk = &self.chunks[idx];
            let local = &chunk.text.as_bytes()[at - chunk.offset..];
            let n = local.len().min(wanted.len() - matched);
            if local[..n] != wanted[matched..matched + n] {
                return Ok(false);
            }
            matched += n;
            at += n;
            idx += 1;
        }

        if matched == wanted.len() {
            Ok(true)
        } else if self.closed {
            Ok(false)
        } else {
            Err(BufferError::NeedInput)
        }
    }

    /// Text in `[pos, pos + len)`, clamped to the data appended so far
    pub fn substr(&self, pos: usize, len: usize) -> Result<Cow<'_, str>, BufferError> {
        self.check_retained(pos)?;
        let end = pos.saturating_add(len).min(self.len);
        if pos >= end {
            return Ok(Cow::Borrowed(""));
        }
        self.slice(pos, end)
    }

    /// Text in exactly `[pos, pos + len)`
    pub fn substr_exact(&self, pos: usize, len: usize) -> Result<Cow<'_, str>, BufferError> {
        self.check_retained(pos)?;
        let end = pos.saturating_add(len);
        if end > self.len {
            return Err(self.past_end());
        }
        if len == 0 {
            return Ok(Cow::Borrowed(""));
        }
        self.slice(pos, end)
    }

    fn slice(&self, pos: usize, end: usize) -> Result<Cow<'_, str>, BufferError> {
        let first = self.chunk_index(pos);
        let chunk = &self.chunks[first];
        if end <= chunk.end() {
            return chunk
                .text
                .get(pos - chunk.offset..end - chunk.offset)
                .map(Cow::Borrowed)
                .ok_or(BufferError::Misaligned(pos));
        }

        let mut out = String::with_capacity(end - pos);
        for chunk in self.chunks.range(first..) {
            if chunk.offset >= end {
                break;
            }
            let from = pos.max(chunk.offset) - chunk.offset;
            let to = end.min(chunk.end()) - chunk.offset;
            let piece = chunk
                .text
                .get(from..to)
                .ok_or(BufferError::Misaligned(chunk.offset + from))?;
            out.push_str(piece);
        }
        Ok(Cow::Owned(out))
    }

    /// 1-based line and character column of `pos`, for diagnostics
    ///
    /// Works across evicted chunks: only `pos` itself must be retained.
    pub fn find_line_and_char(&self, pos: usize) -> Result<(usize, usize), BufferError> {
        self.check_retained(pos)?;
        let pos = pos.min(self.len);
        let mut lines = self.evicted_lines;
        let mut column = self.evicted_column;

        for chunk in &self.chunks {
            if chunk.offset >= pos {
                break;
            }
            let bytes = &chunk.text.as_bytes()[..pos.min(chunk.end()) - chunk.offset];
            let newlines = memchr::memchr_iter(b'\n', bytes).count();
            if newlines > 0 {
                lines += newlines;
                let tail_from = memchr::memrchr(b'\n', bytes).map_or(0, |n| n + 1);
                column = count_chars(&bytes[tail_from..]);
            } else {
                column += count_chars(bytes);
            }
        }
        Ok((lines + 1, column + 1))
    }

    /// The full line containing `pos`, if its start is still retained
    pub fn line_text(&self, pos: usize) -> Option<String> {
        let pos = pos.min(self.len);
        if pos < self.start {
            return None;
        }
        let text = self.slice_all();
        let local = pos - self.start;
        let bytes = text.as_bytes();
        let line_start = match memchr::memrchr(b'\n', &bytes[..local]) {
            Some(n) => n + 1,
            // The line began inside evicted text
            None if self.evicted_column > 0 => return None,
            None => 0,
        };
        let line_end = memchr::memchr(b'\n', &bytes[local..]).map_or(bytes.len(), |n| local + n);
        text.get(line_start..line_end)
            .map(|line| line.trim_end_matches('\r').to_owned())
    }

    fn slice_all(&self) -> Cow<'_, str> {
        match self.chunks.len() {
            0 => Cow::Borrowed(""),
            1 => Cow::Borrowed(self.chunks[0].text.as_str()),
            _ => Cow::Owned(self.chunks.iter().map(|c| c.text.as_str()).collect()),
        }
    }
}
