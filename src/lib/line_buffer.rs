//! Growable line buffer with absolute byte offsets.
//!
//! [`LineBuffer`] wraps any [`Read`] and hands out one line at a time as a borrowed slice,
//! together with the byte offset at which the line starts in the underlying stream. A line
//! that straddles two reads is kept intact: [`LineBuffer::fill`] compacts the unconsumed tail
//! to the front of the buffer (growing it when a single line is larger than the buffer) before
//! reading more bytes.
//!
//! When the inner reader is also [`Seek`], [`LineBuffer::seek_to`] repositions the stream;
//! forward seeks that land inside the buffered window are served without touching the inner
//! reader.

use bstr::ByteSlice;
use std::io::{self, Read, Seek, SeekFrom};

/// Default buffer capacity (256 KiB).
pub const DEFAULT_CAPACITY: usize = 256 * 1024;

/// One line returned by [`LineBuffer::next_line`], without its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Absolute byte offset of the first byte of the line.
    pub offset: u64,
    /// Line bytes, with `\n` and any trailing `\r` removed.
    pub bytes: &'a [u8],
}

/// Buffered line reader that never loses a partially read line across fills.
pub struct LineBuffer<R> {
    inner: R,
    buf: Vec<u8>,
    /// First unconsumed byte in `buf`.
    start: usize,
    /// End of valid data in `buf`.
    end: usize,
    /// Bytes in `buf[start..scanned]` are known to contain no newline.
    scanned: usize,
    /// Absolute stream offset of `buf[start]`.
    offset: u64,
    eof: bool,
}

impl<R: Read> LineBuffer<R> {
    /// Wrap a reader with the default capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    /// Wrap a reader with an explicit initial capacity (at least 1 byte).
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self::starting_at(inner, capacity, 0)
    }

    /// Wrap a reader that is already positioned at `offset` in its stream.
    pub fn starting_at(inner: R, capacity: usize, offset: u64) -> Self {
        Self {
            inner,
            buf: vec![0; capacity.max(1)],
            start: 0,
            end: 0,
            scanned: 0,
            offset,
            eof: false,
        }
    }

    /// Absolute offset of the next unconsumed byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of buffered, unconsumed bytes.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Current buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Move the unconsumed bytes to the front of the buffer.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.end, 0);
        self.scanned -= self.start;
        self.end -= self.start;
        self.start = 0;
    }

    /// Read more bytes from the inner reader, compacting or growing first as needed.
    ///
    /// Returns the number of bytes read; zero means end of stream.
    pub fn fill(&mut self) -> io::Result<usize> {
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
            self.scanned = 0;
        } else if self.end == self.buf.len() {
            self.compact();
        }
        if self.end == self.buf.len() {
            let grown = self.buf.len() * 2;
            self.buf.resize(grown, 0);
        }
        loop {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Return the next line, or `None` at end of stream.
    ///
    /// A final line without a trailing newline is still returned.
    pub fn next_line(&mut self) -> io::Result<Option<Line<'_>>> {
        loop {
            if let Some(pos) = self.buf[self.scanned..self.end].find_byte(b'\n') {
                let line_start = self.start;
                let newline = self.scanned + pos;
                let offset = self.offset;
                let consumed = newline + 1 - line_start;
                self.start = newline + 1;
                self.scanned = self.start;
                self.offset += consumed as u64;
                return Ok(Some(Line { offset, bytes: trim_cr(&self.buf[line_start..newline]) }));
            }
            self.scanned = self.end;

            if self.eof || self.fill()? == 0 {
                if self.start == self.end {
                    return Ok(None);
                }
                let line_start = self.start;
                let line_end = self.end;
                let offset = self.offset;
                self.offset += (line_end - line_start) as u64;
                self.start = line_end;
                self.scanned = line_end;
                return Ok(Some(Line { offset, bytes: trim_cr(&self.buf[line_start..line_end]) }));
            }
        }
    }

    /// Consume the buffer and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> LineBuffer<R> {
    /// Reposition to an absolute offset, discarding buffered bytes unless the target lies
    /// inside the buffered window ahead of the current position.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        let window_end = self.offset + self.buffered() as u64;
        if offset >= self.offset && offset <= window_end {
            let skip = (offset - self.offset) as usize;
            self.start += skip;
            self.scanned = self.scanned.max(self.start);
            self.offset = offset;
            return Ok(());
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.start = 0;
        self.end = 0;
        self.scanned = 0;
        self.offset = offset;
        self.eof = false;
        Ok(())
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
