//! Lazy traversal of a mailbox.
//!
//! Both iterators hold the scan's shared lock until they are exhausted or
//! dropped. A consumer that stops early leaves the cursor mid-stream; the next
//! mailbox operation seeks again before reading.

use std::io::{Read, Seek};
use std::mem;

use crate::error::Result;
use crate::model::mail::MessageBlock;
use crate::options::MboxOptions;
use crate::parser::MessageParser;
use crate::store::cursor::ScanCursor;
use crate::store::lock::LockedSection;

/// Parsed messages, in file order, from wherever the cursor was positioned.
///
/// Stops after the parser reports end of stream or returns an error (the
/// error is yielded once).
pub struct Messages<'a, S, P> {
    cursor: &'a mut ScanCursor<S>,
    parser: &'a P,
    options: MboxOptions,
    lock: Option<LockedSection>,
}

impl<'a, S: Read + Seek, P: MessageParser> Messages<'a, S, P> {
    pub(crate) fn new(
        cursor: &'a mut ScanCursor<S>,
        parser: &'a P,
        options: MboxOptions,
        lock: LockedSection,
    ) -> Self {
        Self {
            cursor,
            parser,
            options,
            lock: Some(lock),
        }
    }

    fn finish(&mut self) {
        self.lock = None;
    }
}

impl<S: Read + Seek, P: MessageParser> Iterator for Messages<'_, S, P> {
    type Item = Result<P::Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lock.as_ref()?;
        match self.parser.parse(&mut *self.cursor, &self.options) {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

/// Raw message blocks, in file order, from the start of the stream.
///
/// Concatenating every block gives back the stream's bytes. Content before
/// the first separator is kept at the head of the first block.
///
/// A stream holding content but no separator at all yields that content as
/// one block, while [`crate::mailbox::Mailbox::length`] reports zero
/// messages. Everywhere else the block count equals `length()`.
pub struct RawMessages<'a, S> {
    cursor: &'a mut ScanCursor<S>,
    options: MboxOptions,
    lock: Option<LockedSection>,
    pending: Vec<u8>,
    pending_offset: u64,
    seen_separator: bool,
    line: Vec<u8>,
}

impl<'a, S: Read + Seek> RawMessages<'a, S> {
    pub(crate) fn new(
        cursor: &'a mut ScanCursor<S>,
        options: MboxOptions,
        lock: LockedSection,
    ) -> Self {
        let pending_offset = cursor.position();
        Self {
            cursor,
            options,
            lock: Some(lock),
            pending: Vec::with_capacity(64 * 1024),
            pending_offset,
            seen_separator: false,
            line: Vec::with_capacity(4096),
        }
    }
}

impl<S: Read + Seek> Iterator for RawMessages<'_, S> {
    type Item = MessageBlock;

    fn next(&mut self) -> Option<MessageBlock> {
        self.lock.as_ref()?;
        loop {
            let Some(len) = self.cursor.read_line(&mut self.line) else {
                self.lock = None;
                if self.pending.is_empty() {
                    return None;
                }
                return Some(MessageBlock {
                    offset: self.pending_offset,
                    bytes: mem::take(&mut self.pending),
                });
            };

            let is_separator = self.options.separator.matches(&self.line);
            if is_separator && self.seen_separator {
                // The separator seeds the next block.
                let line_offset = self.cursor.position() - len as u64;
                let bytes = mem::replace(&mut self.pending, self.line.clone());
                let block = MessageBlock {
                    offset: mem::replace(&mut self.pending_offset, line_offset),
                    bytes,
                };
                return Some(block);
            }
            self.seen_separator |= is_separator;
            self.pending.extend_from_slice(&self.line);
        }
    }
}
