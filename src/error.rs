//! Centralized error types for mboxscan.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxscan library.
#[derive(Error, Debug)]
pub enum MboxError {
    /// I/O error with the associated file path.
    ///
    /// Only raised by seeks and opens. Failures while reading lines during a
    /// scan end the scan instead (see [`crate::store::cursor::ScanCursor`]).
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// A logical message index at or beyond the number of messages.
    #[error("{index} is out of range")]
    OutOfRange { index: usize },

    /// Malformed construction input (bad separator pattern, bad option value).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error raised by a caller-supplied message parser, passed through unmodified.
    #[error(transparent)]
    Parser(Box<dyn std::error::Error + Send + Sync>),

    /// The configuration file could not be used.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, MboxError>`.
pub type Result<T> = std::result::Result<T, MboxError>;

impl MboxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error coming from a custom [`crate::parser::MessageParser`].
    pub fn parser(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Parser(Box::new(source))
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (in-memory buffers, or a stream handed over already open).
impl From<std::io::Error> for MboxError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}
