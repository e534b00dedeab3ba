//! Scan options and per-call overrides.
//!
//! A [`crate::mailbox::Mailbox`] is built with one [`MboxOptions`]. Each
//! traversal may pass [`ParseOverrides`]; they are merged into a fresh copy for
//! that call only and never stored.

use crate::parser::separator::Separator;

/// Options in effect for a scan.
#[derive(Debug, Clone, Default)]
pub struct MboxOptions {
    /// Line predicate marking the start of each message.
    pub separator: Separator,
    /// Forwarded to the message parser: skip retaining message bodies.
    pub headers_only: bool,
}

impl MboxOptions {
    /// Apply `overrides` on top of these options.
    pub fn merged(&self, overrides: &ParseOverrides) -> MboxOptions {
        MboxOptions {
            separator: overrides
                .separator
                .clone()
                .unwrap_or_else(|| self.separator.clone()),
            headers_only: overrides.headers_only.unwrap_or(self.headers_only),
        }
    }
}

/// Per-call option overrides. `None` fields fall through to the mailbox options.
#[derive(Debug, Clone, Default)]
pub struct ParseOverrides {
    pub separator: Option<Separator>,
    pub headers_only: Option<bool>,
}

impl ParseOverrides {
    /// No overrides.
    pub const NONE: ParseOverrides = ParseOverrides {
        separator: None,
        headers_only: None,
    };

    /// Parse headers only for this call.
    pub fn headers_only() -> Self {
        Self {
            headers_only: Some(true),
            ..Self::default()
        }
    }

    /// Use a different separator for this call.
    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = Some(separator);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = MboxOptions::default();
        assert!(!opts.headers_only);
        assert!(opts
            .separator
            .matches(b"From a@b.c Mon Jan 15 08:30:00 2024\n"));
    }

    #[test]
    fn test_overrides_win_for_one_call() {
        let opts = MboxOptions::default();
        let overrides =
            ParseOverrides::headers_only().with_separator(Separator::from_fn(|l| l == b"--\n"));
        let merged = opts.merged(&overrides);
        assert!(merged.headers_only);
        assert!(merged.separator.matches(b"--\n"));
        // the base options are untouched
        assert!(!opts.headers_only);
        assert!(!opts.separator.matches(b"--\n"));
    }

    #[test]
    fn test_none_falls_through() {
        let opts = MboxOptions {
            headers_only: true,
            ..MboxOptions::default()
        };
        let merged = opts.merged(&ParseOverrides::NONE);
        assert!(merged.headers_only);
    }
}
