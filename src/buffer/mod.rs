//! A dual-mode byte buffer.
//!
//! This module implements [`Buffer`], a bounded window of bytes with a read cursor (`position`)
//! and a fill mark (`limit`) over a fixed backing region, holding the positional invariant
//!
//! ```notest
//! 0 ≤ position ≤ limit ≤ capacity
//! ```
//!
//! after every public call. Bytes between `position` and `limit` are *readable*; space between
//! `limit` and `capacity` is *writable*.
//!
//! A buffer runs in one of three modes, distinguished only at runtime:
//!
//! 1. *Pure memory* — constructed over a capacity; hitting the ends of the window is fatal
//!    (underflow/overflow errors).
//! 2. *Conduit-backed* — bound to an external byte source/sink (a [`Conduit`]); reads that
//!    outgrow the window refill from the conduit, writes that outgrow it drain to the conduit,
//!    and conduit end-of-stream turns into read/write EOF errors at the buffer boundary.
//! 3. *Pre-populated memory* — constructed over an existing byte vector, fully readable;
//!    identical to (1) until a conduit is bound later.
//!
//! Reads are zero-copy: [`get`], [`peek`] and [`content`] return slices into the backing region,
//! and the borrow checker pins the buffer immutable for as long as such a slice lives — which is
//! exactly the contract, because compaction, filling, draining and appending all reuse the
//! region and would invalidate the bytes behind the slice.
//!
//! Tokenisation is driven from outside: [`next`] hands the readable window to a caller-supplied
//! *scanner*, which reports either the byte count up to and including a delimiter, or
//! [`EOF`] for "no match yet, feed me more". The buffer compacts, refills, and re-scans until
//! the scanner is satisfied or the input ends. Scanners written against this convention are
//! interoperable across buffer implementations.
//!
//! The buffer is single-owner and non-reentrant, and never suspends.
//!
//! # Examples
//!
//! ```rust
//! use keel::buffer::Buffer;
//!
//! let mut buf = Buffer::new(64);
//! buf.append(b"hello world").unwrap();
//! assert_eq!(buf.get(5).unwrap(), &b"hello"[..]);
//! assert_eq!(buf.readable(), 6);
//! ```
//!
//! [`Buffer`]: struct.Buffer.html
//! [`Conduit`]: conduit/trait.Conduit.html
//! [`get`]: struct.Buffer.html#method.get
//! [`peek`]: struct.Buffer.html#method.peek
//! [`content`]: struct.Buffer.html#method.content
//! [`next`]: struct.Buffer.html#method.next
//! [`EOF`]: conduit/constant.EOF.html

pub mod conduit;


pub use self::conduit::{Conduit, Io, Memory, EOF};

use std::{cmp, fmt};

use slog::Logger;

/// The smallest working window `fill` insists on.
///
/// Filling through a conduit filter needs some room to make progress in; rather than letting a
/// nearly-full buffer degenerate into byte-sized reads, `fill` compacts and then requires at
/// least this much writable space.
pub const MARGIN: usize = 32;

quick_error! {
    /// A buffer failure.
    ///
    /// The single failure channel of this module. Capacity conditions (`Underflow`, `Overflow`,
    /// `TokenTooLarge`), conduit I/O conditions (`ReadEof`, `WriteEof`) and configuration
    /// conditions (`SmallWindow`) all arrive here; structural violations are programmer errors
    /// and trip assertions instead. Errors are surfaced, never retried internally — recovery is
    /// entirely the caller's.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Error {
        /// A read request which neither the window nor any conduit can satisfy.
        Underflow {
            description("buffer underflow")
            display("Read request exceeds the buffer capacity, and no conduit is bound to fill it.")
        }
        /// A write which exceeds the remaining space, with no conduit to drain to.
        Overflow {
            description("buffer overflow")
            display("Write exceeds the writable region, and no conduit is bound to drain to.")
        }
        /// The conduit reached end-of-stream while the buffer still owed bytes to a read.
        ReadEof {
            description("end of conduit on read")
            display("The conduit hit end-of-stream while the buffer still owed bytes.")
        }
        /// The conduit refused writes before the buffer was drained.
        WriteEof {
            description("end of conduit on write")
            display("The conduit refused writes before the buffer was drained.")
        }
        /// No delimiter within an entire buffer's worth of input.
        TokenTooLarge {
            description("token too large")
            display("token too large")
        }
        /// `fill` could not reserve its minimum working window.
        SmallWindow {
            description("input buffer is too small")
            display("input buffer is too small")
        }
    }
}

/// The nature of a buffer's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    /// Line-oriented text, inherited from a textual conduit.
    Text,
    /// Binary data, inherited from a non-textual conduit.
    Binary,
    /// Plain memory; no conduit has stamped a nature on the buffer.
    Raw,
}

/// A dual-mode byte buffer.
///
/// See the [module documentation](index.html) for the full story.
///
/// # Examples
///
/// Conduit-backed reading:
///
/// ```rust
/// use keel::buffer::{Buffer, Memory};
///
/// let mut buf = Buffer::bound(Box::new(Memory::with_input(b"ping".to_vec())));
/// assert_eq!(buf.get(4).unwrap(), &b"ping"[..]);
/// ```
pub struct Buffer {
    /// The backing region. Its length is the buffer's capacity, fixed at construction.
    data: Box<[u8]>,
    /// The read cursor, in `[0, limit]`.
    pos: usize,
    /// The end of readable content, in `[pos, capacity]`.
    limit: usize,
    /// The content nature.
    style: Style,
    /// The bound byte source/sink, if any.
    conduit: Option<Box<dyn Conduit>>,
    /// The log exitpoint.
    log: Logger,
}

impl Buffer {
    /// Create an empty buffer of a given capacity, in pure-memory mode.
    pub fn new(capacity: usize) -> Buffer {
        Buffer {
            data: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            limit: 0,
            style: Style::Raw,
            conduit: None,
            log: Logger::root(slog::Discard, o!()),
        }
    }

    /// Create a buffer bound to a conduit.
    ///
    /// The capacity is the conduit's preferred transfer size, and the style is inherited from
    /// its text/binary nature.
    pub fn bound(conduit: Box<dyn Conduit>) -> Buffer {
        let capacity = conduit.preferred();
        let style = if conduit.textual() {
            Style::Text
        } else {
            Style::Binary
        };

        Buffer {
            data: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            limit: 0,
            style: style,
            conduit: Some(conduit),
            log: Logger::root(slog::Discard, o!()),
        }
    }

    /// Install a structured logger.
    ///
    /// Fresh buffers discard their logging.
    pub fn set_logger(&mut self, log: Logger) {
        self.log = log;
    }

    /// Bind a conduit to an existing buffer.
    ///
    /// The style is restamped from the conduit; the capacity is not — the region was fixed at
    /// construction.
    pub fn bind(&mut self, conduit: Box<dyn Conduit>) {
        debug!(self.log, "binding a conduit";
               "preferred" => conduit.preferred() as u64,
               "textual" => conduit.textual());

        self.style = if conduit.textual() {
            Style::Text
        } else {
            Style::Binary
        };
        self.conduit = Some(conduit);
    }

    /// Detach and return the bound conduit, if any.
    ///
    /// The conduit is handed back intact — the buffer never closes it.
    pub fn unbind(&mut self) -> Option<Box<dyn Conduit>> {
        self.style = Style::Raw;
        self.conduit.take()
    }

    /// The backing region's size.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The read cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The end of readable content.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// How many bytes can be read without touching any conduit.
    pub fn readable(&self) -> usize {
        self.limit - self.pos
    }

    /// How many bytes can be written without touching any conduit.
    pub fn writable(&self) -> usize {
        self.data.len() - self.limit
    }

    /// The content nature.
    pub fn style(&self) -> Style {
        self.style
    }

    /// Is a conduit bound?
    pub fn is_bound(&self) -> bool {
        self.conduit.is_some()
    }

    /// The readable window, as a borrowed slice.
    ///
    /// Invalidated (in the borrow checker's eyes and in fact) by any mutating call.
    pub fn content(&self) -> &[u8] {
        &self.data[self.pos..self.limit]
    }

    /// Read `count` bytes, consuming them.
    ///
    /// When the window holds enough, this is a zero-copy slice of it. Otherwise the buffer
    /// compacts and refills from its conduit until it can satisfy the request: `Underflow` if
    /// `count` exceeds the capacity or no conduit is bound, `ReadEof` if the conduit ends
    /// first.
    pub fn get(&mut self, count: usize) -> Result<&[u8], Error> {
        self.window(count, true)
    }

    /// Read `count` bytes without consuming them.
    ///
    /// Fills exactly like [`get`](#method.get); only the cursor is left alone.
    pub fn peek(&mut self, count: usize) -> Result<&[u8], Error> {
        self.window(count, false)
    }

    /// Copy readable bytes out into `dst`, then top up from the conduit directly.
    ///
    /// The buffer's window is consumed first; if `dst` still has room and a conduit is bound,
    /// the remainder is read straight into `dst`, bypassing the buffer. Returns the number of
    /// bytes produced.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let have = cmp::min(self.limit - self.pos, dst.len());
        dst[..have].copy_from_slice(&self.data[self.pos..self.pos + have]);
        self.pos += have;

        let mut total = have;
        if total < dst.len() {
            let count = match self.conduit {
                Some(ref mut conduit) => conduit.fill(&mut dst[total..]),
                None => EOF,
            };
            if count != EOF {
                total += count;
            }
        }

        total
    }

    /// Append `src` to the writable region.
    ///
    /// On insufficient space with a conduit bound, the buffer is flushed first; if `src` alone
    /// exceeds the whole capacity it is then handed straight to the conduit, bypassing the
    /// buffer. Without a conduit, insufficient space is an `Overflow` error.
    pub fn append(&mut self, src: &[u8]) -> Result<(), Error> {
        if src.len() > self.data.len() - self.limit {
            if self.conduit.is_none() {
                return Err(Error::Overflow);
            }

            self.flush()?;

            if src.len() > self.data.len() {
                trace!(self.log, "bypassing the buffer"; "bytes" => src.len() as u64);

                let accepted = match self.conduit {
                    Some(ref mut conduit) => conduit.flush(src),
                    None => unreachable!(),
                };
                return if accepted { Ok(()) } else { Err(Error::WriteEof) };
            }
        }

        let limit = self.limit;
        self.data[limit..limit + src.len()].copy_from_slice(src);
        self.limit += src.len();
        Ok(())
    }

    /// Move the read cursor.
    ///
    /// Negative counts rewind, bounded by the cursor itself; positive counts consume through
    /// [`get`](#method.get), with its filling behavior and errors.
    pub fn skip(&mut self, count: isize) -> Result<(), Error> {
        if count < 0 {
            let back = cmp::min(count.unsigned_abs(), self.pos);
            self.pos -= back;
            Ok(())
        } else {
            self.get(count as usize).map(|_| ())
        }
    }

    /// Move unread content to the front of the region, reclaiming the consumed prefix.
    ///
    /// The ranges may overlap; the move is lossless for unread bytes, while everything before
    /// the cursor is discarded. Idempotent.
    pub fn compress(&mut self) {
        if self.pos > 0 {
            let readable = self.limit - self.pos;
            if readable > 0 {
                let pos = self.pos;
                let limit = self.limit;
                self.data.copy_within(pos..limit, 0);
            }
            self.pos = 0;
            self.limit = readable;
        }
    }

    /// Forget all content: cursor and limit both return to zero.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.limit = 0;
    }

    /// Set the limit to `extent`.
    ///
    /// Refused (returning false) when `extent` exceeds the capacity or falls below the read
    /// cursor.
    pub fn truncate(&mut self, extent: usize) -> bool {
        if extent <= self.data.len() && extent >= self.pos {
            self.limit = extent;
            true
        } else {
            false
        }
    }

    /// Ask the conduit to consume the entire readable window, then clear.
    ///
    /// Partial acceptance is a `WriteEof` error. Without a conduit this is a no-op.
    pub fn flush(&mut self) -> Result<(), Error> {
        let pending = self.limit - self.pos;
        let accepted = {
            let Buffer {
                ref data,
                ref mut conduit,
                pos,
                limit,
                ..
            } = *self;

            match *conduit {
                Some(ref mut conduit) => conduit.flush(&data[pos..limit]),
                None => return Ok(()),
            }
        };

        if accepted {
            trace!(self.log, "flushed to conduit"; "bytes" => pending as u64);
            self.clear();
            Ok(())
        } else {
            Err(Error::WriteEof)
        }
    }

    /// Write as much as the conduit will accept this call, then compact.
    ///
    /// Partial acceptance is normal and not an error; a conduit refusing outright is
    /// `WriteEof`, and a missing conduit is `Overflow`. Returns the bytes accepted.
    pub fn drain(&mut self) -> Result<usize, Error> {
        let count = {
            let Buffer {
                ref data,
                ref mut conduit,
                pos,
                limit,
                ..
            } = *self;

            match *conduit {
                Some(ref mut conduit) => conduit.write(&data[pos..limit]),
                None => return Err(Error::Overflow),
            }
        };

        if count == EOF {
            return Err(Error::WriteEof);
        }
        assert!(count <= self.limit - self.pos, "conduit drained past the window");

        self.pos += count;
        trace!(self.log, "drained to conduit"; "bytes" => count as u64);
        self.compress();
        Ok(count)
    }

    /// Fill once from the bound conduit.
    ///
    /// `Underflow` if no conduit is bound; otherwise as [`fill_from`](#method.fill_from).
    pub fn fill(&mut self) -> Result<usize, Error> {
        let mut conduit = match self.conduit.take() {
            Some(conduit) => conduit,
            None => return Err(Error::Underflow),
        };
        let result = self.fill_from(&mut *conduit);
        self.conduit = Some(conduit);
        result
    }

    /// Fill once from an arbitrary conduit.
    ///
    /// An empty buffer is cleared first; a cramped one is compacted. Either way at least
    /// [`MARGIN`](constant.MARGIN.html) bytes of working space are required (`SmallWindow`
    /// otherwise). The conduit reads into the writable region once; its count — which may be
    /// [`EOF`](conduit/constant.EOF.html) — is passed through.
    pub fn fill_from(&mut self, conduit: &mut dyn Conduit) -> Result<usize, Error> {
        if self.limit == self.pos {
            self.clear();
        } else if self.data.len() - self.limit < MARGIN {
            self.compress();
        }
        if self.data.len() - self.limit < MARGIN {
            return Err(Error::SmallWindow);
        }

        let count = {
            let limit = self.limit;
            conduit.read(&mut self.data[limit..])
        };
        if count != EOF {
            assert!(count <= self.data.len() - self.limit, "conduit filled past the region");
            self.limit += count;
            trace!(self.log, "filled from conduit"; "bytes" => count as u64);
        }
        Ok(count)
    }

    /// Scan for the next token.
    ///
    /// The scanner is handed the readable window and returns the byte count up to and including
    /// the delimiter it matched, or [`EOF`](conduit/constant.EOF.html) for "no match yet". On a
    /// match the cursor advances by the returned count and the call returns true.
    ///
    /// On no-match: without a conduit the remaining content is skipped and the call returns
    /// false. With one, the buffer compacts (if it can) and refills, then re-scans; a token
    /// spanning the entire capacity is a `TokenTooLarge` error, and end-of-conduit skips the
    /// remainder and returns false.
    pub fn next<F>(&mut self, mut scan: F) -> Result<bool, Error>
    where
        F: FnMut(&[u8]) -> usize,
    {
        loop {
            let consumed = scan(&self.data[self.pos..self.limit]);
            if consumed != EOF {
                assert!(consumed <= self.limit - self.pos, "scanner consumed past the window");
                self.pos += consumed;
                return Ok(true);
            }

            if self.conduit.is_none() {
                self.pos = self.limit;
                return Ok(false);
            }
            if self.pos > 0 {
                self.compress();
            } else if self.limit == self.data.len() {
                return Err(Error::TokenTooLarge);
            }

            if self.pump() == EOF {
                self.pos = self.limit;
                return Ok(false);
            }
        }
    }

    /// Hand the readable window to a delegate, consuming what it reports.
    ///
    /// The delegate returns the bytes it consumed, or [`EOF`](conduit/constant.EOF.html) for
    /// none; the count is passed through either way.
    pub fn read_with<F>(&mut self, consume: F) -> usize
    where
        F: FnOnce(&[u8]) -> usize,
    {
        let count = consume(&self.data[self.pos..self.limit]);
        if count != EOF {
            assert!(count <= self.limit - self.pos, "delegate consumed past the window");
            self.pos += count;
        }
        count
    }

    /// Hand the writable region to a delegate, keeping what it reports.
    ///
    /// The delegate returns the bytes it produced, or [`EOF`](conduit/constant.EOF.html) for
    /// none; the count is passed through either way.
    pub fn write_with<F>(&mut self, produce: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let count = {
            let limit = self.limit;
            produce(&mut self.data[limit..])
        };
        if count != EOF {
            assert!(count <= self.data.len() - self.limit, "delegate produced past the region");
            self.limit += count;
        }
        count
    }

    /// Block until at least one byte is readable.
    ///
    /// Shorthand for a non-consuming one-byte read; with a conduit bound this waits on it, and
    /// without one an empty buffer is an `Underflow` error.
    pub fn wait(&mut self) -> Result<(), Error> {
        self.peek(1).map(|_| ())
    }

    /// The shared implementation of `get` and `peek`.
    fn window(&mut self, count: usize, eat: bool) -> Result<&[u8], Error> {
        if count > self.limit - self.pos {
            if count > self.data.len() || self.conduit.is_none() {
                return Err(Error::Underflow);
            }

            self.compress();
            while self.limit - self.pos < count {
                if self.pump() == EOF {
                    return Err(Error::ReadEof);
                }
            }
        }

        let at = self.pos;
        if eat {
            self.pos += count;
        }
        Ok(&self.data[at..at + count])
    }

    /// One conduit read into the writable region, advancing the limit.
    ///
    /// Passes `EOF` through (also when no conduit is bound).
    fn pump(&mut self) -> usize {
        let count = {
            let Buffer {
                ref mut data,
                ref mut conduit,
                limit,
                ..
            } = *self;

            match *conduit {
                Some(ref mut conduit) => conduit.read(&mut data[limit..]),
                None => EOF,
            }
        };

        if count != EOF {
            assert!(count <= self.data.len() - self.limit, "conduit filled past the region");
            self.limit += count;
            trace!(self.log, "filled from conduit"; "bytes" => count as u64);
        }
        count
    }
}

impl From<Vec<u8>> for Buffer {
    /// Adopt an existing byte vector as a fully readable buffer.
    ///
    /// The capacity equals the vector's length, so the fresh buffer has no writable space until
    /// content is consumed and compacted away.
    fn from(data: Vec<u8>) -> Buffer {
        let limit = data.len();
        Buffer {
            data: data.into_boxed_slice(),
            pos: 0,
            limit: limit,
            style: Style::Raw,
            conduit: None,
            log: Logger::root(slog::Discard, o!()),
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Buffer {{ position: {}, limit: {}, capacity: {}, style: {:?}, bound: {} }}",
            self.pos,
            self.limit,
            self.data.len(),
            self.style,
            self.conduit.is_some()
        )
    }
}
