//! The mailbox facade.
//!
//! A [`Mailbox`] owns one stream for its whole life and answers every
//! question by scanning it: there is no index, so `length`, `index_of` and
//! the range queries are all linear in the file size, and always reflect the
//! file as it is now.
//!
//! The stream position is shared by every operation, so one `Mailbox` must
//! not be used from several places at once. The borrow checker enforces this
//! for the lazy iterators, which borrow the mailbox mutably until dropped.

pub mod iter;
pub mod range;

use std::fs::File;
use std::io::{self, Cursor};
use std::iter::Take;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{MboxError, Result};
use crate::model::mail::{MessageBlock, ParsedMessage};
use crate::options::{MboxOptions, ParseOverrides};
use crate::parser::mail::MailParser;
use crate::parser::separator::Separator;
use crate::parser::MessageParser;
use crate::store::cursor::{BlockLine, ScanCursor, DEFAULT_BUFFER_SIZE};
use crate::store::lock::SharedLock;
use crate::store::stream::MboxStream;

use self::iter::{Messages, RawMessages};
use self::range::{DateRange, Ranged};

/// An MBOX mailbox over an already-open stream.
pub struct Mailbox<S, P = MailParser> {
    cursor: ScanCursor<S>,
    parser: P,
    options: MboxOptions,
    lock: SharedLock,
    name: Option<String>,
    path: Option<PathBuf>,
}

impl<S: MboxStream> Mailbox<S> {
    /// Mailbox with default options and the default parser.
    pub fn new(stream: S) -> Result<Self> {
        Self::with_options(stream, MboxOptions::default())
    }

    /// Mailbox with the default parser.
    pub fn with_options(stream: S, options: MboxOptions) -> Result<Self> {
        Self::with_parser(stream, options, MailParser)
    }
}

impl Mailbox<Cursor<Vec<u8>>> {
    /// In-memory mailbox. Never locks.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::build(
            Cursor::new(bytes.into()),
            MboxOptions::default(),
            MailParser,
            SharedLock::unsupported(),
        )
    }
}

impl<S: MboxStream, P: MessageParser> Mailbox<S, P> {
    /// Mailbox driving a custom message parser.
    ///
    /// Whether the stream can be locked is decided here, once.
    pub fn with_parser(stream: S, options: MboxOptions, parser: P) -> Result<Self> {
        let lock = SharedLock::new(stream.lock_handle()?);
        debug!(locking = lock.is_supported(), "Opened mailbox");
        Ok(Self::build(stream, options, parser, lock))
    }

    fn build(stream: S, options: MboxOptions, parser: P, lock: SharedLock) -> Self {
        Self {
            cursor: ScanCursor::new(stream),
            parser,
            options,
            lock,
            name: None,
            path: None,
        }
    }

    /// Use a read buffer of `capacity` bytes.
    pub fn with_buffer_capacity(self, capacity: usize) -> Self {
        Self {
            cursor: ScanCursor::with_capacity(capacity, self.cursor.into_inner()),
            ..self
        }
    }

    /// Options set at construction. Per-call overrides never change them.
    pub fn options(&self) -> &MboxOptions {
        &self.options
    }

    /// File name, when opened through [`open`].
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// File path, when opened through [`open`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether scans take an advisory shared lock on the stream.
    pub fn supports_locking(&self) -> bool {
        self.lock.is_supported()
    }

    /// Every message, parsed, from the start of the mailbox.
    pub fn each(&mut self, overrides: &ParseOverrides) -> Result<Messages<'_, S, P>> {
        let options = self.options.merged(overrides);
        self.cursor.reset()?;
        let lock = self.lock.acquire();
        Ok(Messages::new(&mut self.cursor, &self.parser, options, lock))
    }

    /// Every message as raw bytes, from the start of the mailbox.
    pub fn each_raw_message(
        &mut self,
        overrides: &ParseOverrides,
    ) -> Result<RawMessages<'_, S>> {
        let options = self.options.merged(overrides);
        self.cursor.reset()?;
        let lock = self.lock.acquire();
        Ok(RawMessages::new(&mut self.cursor, options, lock))
    }

    /// Up to `count` parsed messages starting at message `start`.
    ///
    /// Fails with `OutOfRange` if there is no message `start`.
    pub fn first_n(
        &mut self,
        start: usize,
        count: usize,
        overrides: &ParseOverrides,
    ) -> Result<Take<Messages<'_, S, P>>> {
        let options = self.options.merged(overrides);
        let lock = self.lock.acquire();
        self.cursor.seek_to_index(start, &options.separator)?;
        Ok(Messages::new(&mut self.cursor, &self.parser, options, lock).take(count))
    }

    /// Messages up to and including `date`, plus undated ones, stopping at the
    /// first message dated later.
    pub fn until(
        &mut self,
        date: DateTime<Utc>,
        overrides: &ParseOverrides,
    ) -> Result<Ranged<'_, S, P>> {
        self.ranged(DateRange::Until(date), overrides)
    }

    /// Everything from the first message dated at or after `date` onwards.
    pub fn since(
        &mut self,
        date: DateTime<Utc>,
        overrides: &ParseOverrides,
    ) -> Result<Ranged<'_, S, P>> {
        self.ranged(DateRange::Since(date), overrides)
    }

    /// Dated messages within `[after, before]`, stopping at the first message
    /// dated after `before`.
    pub fn between(
        &mut self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        overrides: &ParseOverrides,
    ) -> Result<Ranged<'_, S, P>> {
        self.ranged(DateRange::Between { after, before }, overrides)
    }

    fn ranged(
        &mut self,
        range: DateRange,
        overrides: &ParseOverrides,
    ) -> Result<Ranged<'_, S, P>> {
        let messages = self.each(overrides)?;
        Ok(Ranged::new(messages, range))
    }

    /// Raw bytes of message `index` (zero-based).
    ///
    /// Rescans from the start of the file on every call.
    pub fn index_of(&mut self, index: usize) -> Result<MessageBlock> {
        let separator = &self.options.separator;
        let cursor = &mut self.cursor;
        self.lock.with_lock(|| read_block_at(cursor, index, separator))
    }

    /// Number of messages. Recounted on every call.
    pub fn length(&mut self) -> Result<usize> {
        let separator = &self.options.separator;
        let cursor = &mut self.cursor;
        let count = self
            .lock
            .with_lock(|| cursor.count_separators(separator))?;
        debug!(count, "Counted messages");
        Ok(count)
    }

    /// Whether the mailbox holds no message. Stops at the first separator.
    pub fn is_empty(&mut self) -> Result<bool> {
        let separator = &self.options.separator;
        let cursor = &mut self.cursor;
        let found = self.lock.with_lock(|| cursor.seek_to_index(0, separator));
        match found {
            Ok(_) => Ok(false),
            Err(MboxError::OutOfRange { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Whether any message is unread. Parses headers only and stops at the
    /// first unread message.
    pub fn has_unread(&mut self) -> Result<bool> {
        for message in self.each(&ParseOverrides::headers_only())? {
            if message?.is_unread() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The read error that cut the last scan short, if any.
    ///
    /// Read errors end a scan the same way end of stream does; this tells
    /// the two apart.
    pub fn read_failure(&self) -> Option<&io::Error> {
        self.cursor.failure()
    }

    /// Close the mailbox, releasing the stream.
    pub fn close(self) {
        debug!(
            name = self.name.as_deref().unwrap_or("<stream>"),
            "Closed mailbox"
        );
    }

    /// Give back the stream.
    pub fn into_inner(self) -> S {
        self.cursor.into_inner()
    }
}

fn read_block_at<S: MboxStream>(
    cursor: &mut ScanCursor<S>,
    index: usize,
    separator: &Separator,
) -> Result<MessageBlock> {
    let offset = cursor.seek_to_index(index, separator)?;
    if cursor.is_at_end() {
        return Err(MboxError::OutOfRange { index });
    }

    let mut line = Vec::with_capacity(4096);
    let mut bytes = Vec::with_capacity(64 * 1024);
    if cursor.read_line(&mut line).is_none() {
        return Err(MboxError::OutOfRange { index });
    }
    bytes.extend_from_slice(&line);
    while cursor.next_block_line(separator, &mut line)? == BlockLine::Line {
        bytes.extend_from_slice(&line);
    }
    Ok(MessageBlock { offset, bytes })
}

/// Open the MBOX file at `path` read-only, hand it to `f`, and close it
/// afterwards, whether `f` succeeds, fails or returns early.
pub fn open<T, E>(
    path: impl AsRef<Path>,
    options: MboxOptions,
    f: impl FnOnce(&mut Mailbox<File>) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<MboxError>,
{
    open_with_capacity(path, options, DEFAULT_BUFFER_SIZE, f)
}

/// [`open`] with a read buffer of `capacity` bytes.
pub fn open_with_capacity<T, E>(
    path: impl AsRef<Path>,
    options: MboxOptions,
    capacity: usize,
    f: impl FnOnce(&mut Mailbox<File>) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<MboxError>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            MboxError::FileNotFound(path.to_path_buf())
        } else {
            MboxError::io(path, e)
        }
    })?;

    let mut mbox = Mailbox::with_options(file, options)?.with_buffer_capacity(capacity);
    mbox.path = Some(path.to_path_buf());
    mbox.name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let result = f(&mut mbox);
    mbox.close();
    result
}
