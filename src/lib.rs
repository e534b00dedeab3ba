//! `mboxscan`: lazy, streaming access to MBOX mailboxes.
//!
//! An MBOX file is a flat concatenation of messages, each introduced by a
//! `From ` envelope line. This crate scans such files without loading them:
//! counting messages, fetching one by position, and iterating messages
//! (parsed or raw), optionally bounded by date.
//!
//! ```no_run
//! use mboxscan::{MboxOptions, ParseOverrides};
//!
//! mboxscan::mailbox::open("inbox.mbox", MboxOptions::default(), |mbox| {
//!     println!("{} messages", mbox.length()?);
//!     for mail in mbox.each(&ParseOverrides::headers_only())? {
//!         println!("{:?}", mail?.subject());
//!     }
//!     Ok::<_, mboxscan::MboxError>(())
//! })?;
//! # Ok::<_, mboxscan::MboxError>(())
//! ```

pub mod config;
pub mod error;
pub mod mailbox;
pub mod model;
pub mod options;
pub mod parser;
pub mod store;

pub use error::{MboxError, Result};
pub use mailbox::Mailbox;
pub use model::mail::{Mail, MessageBlock, ParsedMessage};
pub use options::{MboxOptions, ParseOverrides};
pub use parser::separator::Separator;
