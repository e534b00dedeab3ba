//! Date-bounded traversal.
//!
//! Messages in an MBOX are in delivery order, which is not necessarily date
//! order, so every query is a forward scan from the first message. The three
//! bounds treat undated and out-of-order messages differently:
//!
//! - `Until`: undated messages are always yielded; the scan stops at the
//!   first message dated after the bound.
//! - `Since`: undated and earlier messages are skipped until the first
//!   message dated at or after the bound; from then on everything is yielded.
//! - `Between`: undated messages are skipped; the scan stops at the first
//!   message dated after `before`; each dated message is yielded if it is at
//!   or after `after`.

use std::io::{Read, Seek};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::mailbox::iter::Messages;
use crate::model::mail::ParsedMessage;
use crate::parser::MessageParser;

/// A date bound for [`Ranged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Until(DateTime<Utc>),
    Since(DateTime<Utc>),
    Between {
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    },
}

enum Verdict {
    Yield,
    Skip,
    Stop,
}

impl DateRange {
    fn judge(&self, date: Option<DateTime<Utc>>, latched: &mut bool) -> Verdict {
        match *self {
            DateRange::Until(bound) => match date {
                Some(d) if d > bound => Verdict::Stop,
                _ => Verdict::Yield,
            },
            DateRange::Since(bound) => {
                if *latched {
                    return Verdict::Yield;
                }
                match date {
                    Some(d) if d >= bound => {
                        *latched = true;
                        Verdict::Yield
                    }
                    _ => Verdict::Skip,
                }
            }
            DateRange::Between { after, before } => match date {
                None => Verdict::Skip,
                Some(d) if d > before => Verdict::Stop,
                Some(d) if d >= after => Verdict::Yield,
                Some(_) => Verdict::Skip,
            },
        }
    }
}

/// Parsed messages filtered by a [`DateRange`].
///
/// Parser errors are passed through and end the scan.
pub struct Ranged<'a, S, P> {
    inner: Option<Messages<'a, S, P>>,
    range: DateRange,
    latched: bool,
}

impl<'a, S: Read + Seek, P: MessageParser> Ranged<'a, S, P> {
    pub(crate) fn new(inner: Messages<'a, S, P>, range: DateRange) -> Self {
        Self {
            inner: Some(inner),
            range,
            latched: false,
        }
    }
}

impl<S: Read + Seek, P: MessageParser> Iterator for Ranged<'_, S, P> {
    type Item = Result<P::Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let message = match self.inner.as_mut()?.next()? {
                Ok(message) => message,
                Err(e) => {
                    self.inner = None;
                    return Some(Err(e));
                }
            };
            match self.range.judge(message.date(), &mut self.latched) {
                Verdict::Yield => return Some(Ok(message)),
                Verdict::Skip => continue,
                Verdict::Stop => {
                    // Dropping the inner iterator releases the lock now.
                    self.inner = None;
                    return None;
                }
            }
        }
    }
}
