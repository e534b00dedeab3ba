//! Message parsing: separator detection, header handling, and the parser
//! collaborator the scanning engine drives.

pub mod header;
pub mod mail;
pub mod separator;

use std::io::{Read, Seek};

use crate::error::Result;
use crate::model::mail::ParsedMessage;
use crate::options::MboxOptions;
use crate::store::cursor::ScanCursor;

/// Turns the bytes of one message into a structured message.
///
/// Called repeatedly by [`crate::mailbox::iter::Messages`]. Each call must
/// consume exactly one message and leave the cursor at the start of the next
/// one (or at end of stream), and returns `Ok(None)` once no message is left.
pub trait MessageParser {
    type Message: ParsedMessage;

    fn parse<S: Read + Seek>(
        &self,
        cursor: &mut ScanCursor<S>,
        options: &MboxOptions,
    ) -> Result<Option<Self::Message>>;
}
