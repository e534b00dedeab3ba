//! Message types produced by a scan.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parser::header::get_header;
use crate::parser::separator::Separator;

/// What the scanning engine needs from a parsed message.
///
/// Date-bounded traversal reads [`ParsedMessage::date`];
/// [`crate::mailbox::Mailbox::has_unread`] reads [`ParsedMessage::is_unread`].
pub trait ParsedMessage {
    /// The message date, if one can be resolved.
    fn date(&self) -> Option<DateTime<Utc>>;

    /// Whether the message is flagged unread. Parsers without read state
    /// report `false`.
    fn is_unread(&self) -> bool {
        false
    }
}

/// Raw bytes of one message: its separator line up to (not including) the
/// next separator line, or end of stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBlock {
    /// Byte offset of the block inside the stream.
    pub offset: u64,
    /// The bytes, exactly as stored.
    pub bytes: Vec<u8>,
}

impl MessageBlock {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The first line, terminator stripped. For the first block of a stream
    /// with a preamble this is a preamble line, not the separator.
    pub fn first_line(&self) -> &[u8] {
        self.lines().next().map(trim_line_end).unwrap_or_default()
    }

    /// The first line matching `separator`, terminator stripped.
    pub fn separator_line(&self, separator: &Separator) -> Option<&[u8]> {
        self.lines()
            .find(|line| separator.matches(line))
            .map(trim_line_end)
    }

    fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes.split_inclusive(|&b| b == b'\n')
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// The envelope (`From `) line of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// The envelope sender token (`MAILER-DAEMON`, an address, ...).
    pub sender: String,
    /// The delivery date written on the envelope line.
    pub date: Option<DateTime<Utc>>,
}

/// Read state from the `Status:` and `X-Status:` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessageStatus {
    /// `R` in `Status:`.
    pub read: bool,
    /// `O` in `Status:` (seen by a client, not necessarily read).
    pub old: bool,
    /// `A` in `X-Status:`.
    pub answered: bool,
    /// `F` in `X-Status:`.
    pub flagged: bool,
    /// `D` in `X-Status:`.
    pub deleted: bool,
}

/// A message parsed by [`crate::parser::mail::MailParser`].
#[derive(Debug, Clone)]
pub struct Mail {
    pub(crate) offset: u64,
    pub(crate) length: u64,
    pub(crate) envelope: Envelope,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) date: Option<DateTime<Utc>>,
    pub(crate) status: MessageStatus,
}

impl Mail {
    /// Byte offset of the separator line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length in bytes, separator line included.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Unfolded headers as `(lowercase_name, value)` pairs, in file order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.header("subject")
    }

    pub fn from(&self) -> Option<&str> {
        self.header("from")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header("message-id")
    }

    /// Body bytes. Empty when parsed with `headers_only`.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }
}

impl ParsedMessage for Mail {
    fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    fn is_unread(&self) -> bool {
        !self.status.read
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
