//! Default message parser.
//!
//! Reads one message per call: envelope line, headers up to the first blank
//! line, then body lines up to the next separator. Lines before the first
//! separator (a preamble) are skipped.

use std::io::{Read, Seek};

use tracing::debug;

use crate::error::Result;
use crate::model::mail::Mail;
use crate::options::MboxOptions;
use crate::parser::header::{
    get_header, parse_date, parse_envelope, parse_status, unfold_headers,
};
use crate::parser::MessageParser;
use crate::store::cursor::{BlockLine, ScanCursor};

/// Parser producing [`Mail`] values.
///
/// Honors `headers_only`: the body is still consumed, but not kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailParser;

impl MessageParser for MailParser {
    type Message = Mail;

    fn parse<S: Read + Seek>(
        &self,
        cursor: &mut ScanCursor<S>,
        options: &MboxOptions,
    ) -> Result<Option<Mail>> {
        let separator = &options.separator;
        let mut line: Vec<u8> = Vec::with_capacity(1024);

        let mut skipped: u64 = 0;
        let first_len = loop {
            match cursor.read_line(&mut line) {
                None => return Ok(None),
                Some(len) if separator.matches(&line) => break len,
                Some(len) => skipped += len as u64,
            }
        };
        if skipped > 0 {
            debug!(bytes = skipped, "Skipped content before message separator");
        }

        let offset = cursor.position() - first_len as u64;
        let envelope = parse_envelope(&String::from_utf8_lossy(&line));

        let mut header_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut body: Vec<u8> = Vec::new();
        let mut in_headers = true;

        while cursor.next_block_line(separator, &mut line)? == BlockLine::Line {
            if in_headers {
                if is_blank_line(&line) {
                    in_headers = false;
                } else {
                    header_buf.extend_from_slice(&line);
                }
            } else if !options.headers_only {
                body.extend_from_slice(&line);
            }
        }

        let headers = unfold_headers(&header_buf);
        let date = get_header(&headers, "date").and_then(parse_date);
        let status = parse_status(&headers);

        Ok(Some(Mail {
            offset,
            length: cursor.position() - offset,
            envelope,
            headers,
            body,
            date,
            status,
        }))
    }
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
