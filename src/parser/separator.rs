//! Message separator detection.
//!
//! An MBOX file has no structural index: a new message starts wherever a line
//! matches the separator. The default matcher accepts the classic envelope
//! line, `From <sender> <asctime date>`, and nothing looser, so body text that
//! merely starts with `From` does not split a message.
//!
//! A body line that happens to look exactly like an envelope line will still
//! be taken as a boundary. That is a property of the format.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::bytes::Regex;

use crate::error::{MboxError, Result};

/// Default envelope line: sender token, weekday, month, space-padded day,
/// `HH:MM:SS` and a 4-digit year.
pub const DEFAULT_PATTERN: &str =
    r"From [^\s]+  ?\w{3}(,| )\w{3} (\d| )\d \d{2}:\d{2}:\d{2} \d{4}";

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

static DEFAULT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile(DEFAULT_PATTERN).expect("DEFAULT_PATTERN is a valid regex")
});

fn compile(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("(?-u)^(?:{pattern})"))
}

/// Line predicate marking the first line of a message.
///
/// Cheap to clone. The whole predicate is replaced when configured, never
/// parts of it.
#[derive(Clone)]
pub enum Separator {
    /// A byte-oriented regular expression, anchored at line start.
    Pattern(Regex),
    /// An arbitrary predicate over one raw line (terminator included).
    Predicate(Arc<dyn Fn(&[u8]) -> bool + Send + Sync>),
}

impl Separator {
    /// The standard mbox envelope matcher.
    pub fn mbox() -> Self {
        Self::Pattern(DEFAULT_REGEX.clone())
    }

    /// Compile a regular expression into a separator.
    ///
    /// The pattern is anchored at the start of the line whether or not it
    /// begins with `^`. Character classes are ASCII-only so that arbitrary
    /// bytes in the file never make matching fail.
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        compile(pattern)
            .map(Self::Pattern)
            .map_err(|e| MboxError::InvalidArgument(format!("separator pattern: {e}")))
    }

    /// Use a custom predicate.
    pub fn from_fn(f: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Does `line` start a new message?
    pub fn matches(&self, line: &[u8]) -> bool {
        let line = line.strip_prefix(BOM).unwrap_or(line);
        match self {
            Self::Pattern(re) => re.is_match(line),
            Self::Predicate(f) => f(line),
        }
    }
}

impl Default for Separator {
    fn default() -> Self {
        Self::mbox()
    }
}

impl fmt::Debug for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
