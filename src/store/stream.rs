//! Input resources a mailbox can be read from.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek};

/// A seekable byte stream holding MBOX data.
///
/// Whether the stream supports advisory locking is decided once, when the
/// mailbox is built, through [`MboxStream::lock_handle`].
pub trait MboxStream: Read + Seek {
    /// A handle to take advisory locks on, or `None` if the stream cannot be
    /// locked (in-memory buffers).
    fn lock_handle(&self) -> io::Result<Option<File>> {
        Ok(None)
    }
}

impl MboxStream for File {
    fn lock_handle(&self) -> io::Result<Option<File>> {
        // The clone shares the open file description, so a lock taken through
        // it covers this handle too.
        self.try_clone().map(Some)
    }
}

impl<T: AsRef<[u8]>> MboxStream for Cursor<T> {}

impl<S: MboxStream + ?Sized> MboxStream for &mut S {
    fn lock_handle(&self) -> io::Result<Option<File>> {
        (**self).lock_handle()
    }
}

impl<S: MboxStream + ?Sized> MboxStream for Box<S> {
    fn lock_handle(&self) -> io::Result<Option<File>> {
        (**self).lock_handle()
    }
}
