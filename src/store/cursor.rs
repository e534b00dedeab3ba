//! Line-oriented scanning over an MBOX stream.
//!
//! The cursor owns the stream and its position. Every whole-mailbox
//! operation starts with [`ScanCursor::reset`]; nothing about the position
//! survives between operations.
//!
//! Read failures never abort a scan. MBOX files are routinely truncated or
//! appended to while being read, so a failed line read is reported as end of
//! stream, and the error is kept aside ([`ScanCursor::failure`]) for callers
//! that want to tell a clean end from a broken stream.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::error::{MboxError, Result};
use crate::parser::separator::Separator;

/// Default read buffer (128 KB).
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// What [`ScanCursor::next_block_line`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLine {
    /// A line belonging to the current message, now in the buffer.
    Line,
    /// The next message's separator. The cursor was rewound to its start.
    NextMessage,
    /// End of stream.
    End,
}

/// Buffered reader over an MBOX stream that tracks its byte offset.
pub struct ScanCursor<S> {
    reader: BufReader<S>,
    offset: u64,
    failure: Option<io::Error>,
}

impl<S: Read + Seek> ScanCursor<S> {
    /// Wrap `stream` with the default buffer size.
    pub fn new(stream: S) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, stream)
    }

    /// Wrap `stream` with a read buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity.max(1), stream),
            offset: 0,
            failure: None,
        }
    }

    /// Seek to the start of the stream and forget any earlier read failure.
    pub fn reset(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        self.failure = None;
        Ok(())
    }

    /// Byte offset of the next line to be read.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Read one line, terminator included, into `buf` (cleared first).
    ///
    /// Returns the line length, or `None` at end of stream. A read error
    /// also yields `None` and ends the scan until the next reset.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> Option<usize> {
        buf.clear();
        if self.failure.is_some() {
            return None;
        }
        match self.reader.read_until(b'\n', buf) {
            Ok(0) => None,
            Ok(n) => {
                self.offset += n as u64;
                Some(n)
            }
            Err(e) => {
                self.record_failure(e);
                buf.clear();
                None
            }
        }
    }

    /// Whether no more data can be read from the current position.
    pub fn is_at_end(&mut self) -> bool {
        if self.failure.is_some() {
            return true;
        }
        match self.reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(e) => {
                self.record_failure(e);
                true
            }
        }
    }

    /// Step back over a line of `len` bytes that was just read.
    pub fn rewind_line(&mut self, len: usize) -> Result<()> {
        self.reader.seek_relative(-(len as i64))?;
        self.offset -= len as u64;
        Ok(())
    }

    /// Read the next line of the current message.
    ///
    /// A separator line is not consumed: the cursor is left at its start so
    /// it begins the next message.
    pub fn next_block_line(
        &mut self,
        separator: &Separator,
        buf: &mut Vec<u8>,
    ) -> Result<BlockLine> {
        match self.read_line(buf) {
            None => Ok(BlockLine::End),
            Some(len) if separator.matches(buf) => {
                self.rewind_line(len)?;
                Ok(BlockLine::NextMessage)
            }
            Some(_) => Ok(BlockLine::Line),
        }
    }

    /// Position the cursor on the first line of message `index` (zero-based,
    /// counted in separators from the start of the stream).
    ///
    /// This rescans from offset 0 on every call, so indexed access is linear
    /// in the file size. Offsets are not cached, since the file may change
    /// between calls.
    ///
    /// Returns the message's byte offset, or `OutOfRange` if the stream holds
    /// `index` or fewer separators.
    pub fn seek_to_index(&mut self, index: usize, separator: &Separator) -> Result<u64> {
        self.reset()?;
        let mut seen = 0usize;
        let mut line = Vec::with_capacity(4096);
        while let Some(len) = self.read_line(&mut line) {
            if separator.matches(&line) {
                if seen == index {
                    self.rewind_line(len)?;
                    debug!(index, offset = self.offset, "Seeked to message");
                    return Ok(self.offset);
                }
                seen += 1;
            }
        }
        Err(MboxError::OutOfRange { index })
    }

    /// Count separator lines from the start of the stream.
    pub fn count_separators(&mut self, separator: &Separator) -> Result<usize> {
        self.reset()?;
        let mut count = 0usize;
        let mut line = Vec::with_capacity(4096);
        while self.read_line(&mut line).is_some() {
            if separator.matches(&line) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// The read error that ended the current scan, if it did not end cleanly.
    pub fn failure(&self) -> Option<&io::Error> {
        self.failure.as_ref()
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    fn record_failure(&mut self, e: io::Error) {
        warn!(
            offset = self.offset,
            error = %e,
            "Read failed, treating as end of stream"
        );
        self.failure = Some(e);
    }
}
