//! Conduits: external byte sources and sinks.
//!
//! A conduit is the device end of a [`Buffer`](../struct.Buffer.html): something bytes can be
//! read from and written to, with a preferred transfer size and a text/binary nature. The trait
//! acts similarly to `std::io::{Read, Write}`, but is designed specifically for buffers: calls
//! report progress as plain counts, and end-of-stream is a distinguished sentinel value rather
//! than a zero or an error, so that scanners and delegate windows can share the same convention.

use std::io;
use std::io::{Read, Write};

/// The end-of-stream sentinel.
///
/// Returned in place of a byte count by conduit reads and writes, by scanners meaning "no match
/// in this window yet", and by delegate windows meaning "nothing consumed or produced". It is
/// deliberately a `usize` in-band value — all ones — so the same convention works across every
/// count-returning seam of this module.
pub const EOF: usize = !0;

/// An external byte source/sink.
///
/// Conduits are single-owner and non-reentrant, like the buffers above them. A conduit never
/// retries internally: partial progress is reported as a short count, terminal conditions as
/// [`EOF`](constant.EOF.html).
pub trait Conduit {
    /// The transfer size this conduit performs best at.
    ///
    /// Buffers bound to the conduit size their backing region from this.
    fn preferred(&self) -> usize;

    /// Does the conduit carry text rather than binary data?
    fn textual(&self) -> bool;

    /// Read at most `dst.len()` bytes into `dst`.
    ///
    /// Returns the number of bytes read, or `EOF` once the source is exhausted.
    fn read(&mut self, dst: &mut [u8]) -> usize;

    /// Write at most `src.len()` bytes from `src`.
    ///
    /// Returns the number of bytes accepted — possibly fewer than offered — or `EOF` if the sink
    /// refuses to accept anything further.
    fn write(&mut self, src: &[u8]) -> usize;

    /// Consume `src` in its entirety.
    ///
    /// Returns false if the sink gave up before everything was accepted.
    fn flush(&mut self, src: &[u8]) -> bool;

    /// Read into `dst` until it is full or the source ends.
    ///
    /// A direct-read convenience looping over [`read`](#tymethod.read): returns the bytes
    /// placed, or `EOF` if the source ended before producing anything.
    fn fill(&mut self, dst: &mut [u8]) -> usize {
        let mut total = 0;
        while total < dst.len() {
            let count = self.read(&mut dst[total..]);
            if count == EOF || count == 0 {
                break;
            }
            total += count;
        }

        if total == 0 && !dst.is_empty() {
            EOF
        } else {
            total
        }
    }
}

/// How big `Memory`'s preferred transfer is unless configured otherwise.
const MEMORY_PREFERRED: usize = 8192;

/// An in-memory conduit.
///
/// Reading walks a fixed input script; writing appends to a captured output vector. Useful
/// wherever a real device is too much — scripted protocol runs, tests, replaying captured
/// traffic through buffer-based code.
pub struct Memory {
    /// The bytes reads are served from.
    input: Vec<u8>,
    /// The read position within `input`.
    at: usize,
    /// Everything written so far.
    output: Vec<u8>,
    /// The advertised preferred transfer size.
    preferred: usize,
    /// The advertised text/binary nature.
    textual: bool,
}

impl Memory {
    /// Create an empty memory conduit: reads hit EOF immediately, writes are captured.
    pub fn new() -> Memory {
        Memory::with_input(Vec::new())
    }

    /// Create a memory conduit serving reads from `input`.
    pub fn with_input(input: Vec<u8>) -> Memory {
        Memory {
            input: input,
            at: 0,
            output: Vec::new(),
            preferred: MEMORY_PREFERRED,
            textual: false,
        }
    }

    /// Set the advertised preferred transfer size.
    pub fn preferring(mut self, preferred: usize) -> Memory {
        self.preferred = preferred;
        self
    }

    /// Mark the conduit as carrying text.
    pub fn text(mut self) -> Memory {
        self.textual = true;
        self
    }

    /// The bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.output
    }

    /// The bytes not yet served to any reader.
    pub fn unread(&self) -> &[u8] {
        &self.input[self.at..]
    }
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new()
    }
}

impl Conduit for Memory {
    fn preferred(&self) -> usize {
        self.preferred
    }

    fn textual(&self) -> bool {
        self.textual
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        let left = self.input.len() - self.at;
        if left == 0 {
            return EOF;
        }

        let count = if left < dst.len() { left } else { dst.len() };
        dst[..count].copy_from_slice(&self.input[self.at..self.at + count]);
        self.at += count;
        count
    }

    fn write(&mut self, src: &[u8]) -> usize {
        self.output.extend_from_slice(src);
        src.len()
    }

    fn flush(&mut self, src: &[u8]) -> bool {
        self.output.extend_from_slice(src);
        true
    }
}

/// How big `Io`'s preferred transfer is unless configured otherwise.
const IO_PREFERRED: usize = 8192;

/// An adapter making any `std::io` stream a conduit.
///
/// `Ok(0)` from a read into a non-empty destination marks end of stream, `Interrupted` errors
/// are retried, and any other error surfaces as [`EOF`](constant.EOF.html) — at the conduit
/// boundary a dead stream and an exhausted one look the same, and the buffer above translates
/// either into its read/write EOF errors.
pub struct Io<T> {
    /// The wrapped stream.
    inner: T,
    /// The advertised preferred transfer size.
    preferred: usize,
    /// The advertised text/binary nature.
    textual: bool,
}

impl<T: Read + Write> Io<T> {
    /// Wrap a stream with default advertisements (binary, 8 KiB transfers).
    pub fn new(inner: T) -> Io<T> {
        Io {
            inner: inner,
            preferred: IO_PREFERRED,
            textual: false,
        }
    }

    /// Set the advertised preferred transfer size.
    pub fn preferring(mut self, preferred: usize) -> Io<T> {
        self.preferred = preferred;
        self
    }

    /// Mark the stream as carrying text.
    pub fn text(mut self) -> Io<T> {
        self.textual = true;
        self
    }

    /// Unwrap the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> Conduit for Io<T> {
    fn preferred(&self) -> usize {
        self.preferred
    }

    fn textual(&self) -> bool {
        self.textual
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        loop {
            match self.inner.read(dst) {
                Ok(0) if !dst.is_empty() => return EOF,
                Ok(count) => return count,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return EOF,
            }
        }
    }

    fn write(&mut self, src: &[u8]) -> usize {
        loop {
            match self.inner.write(src) {
                Ok(0) if !src.is_empty() => return EOF,
                Ok(count) => return count,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return EOF,
            }
        }
    }

    fn flush(&mut self, src: &[u8]) -> bool {
        self.inner.write_all(src).is_ok() && self.inner.flush().is_ok()
    }
}
