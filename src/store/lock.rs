//! Advisory shared locking around scans.
//!
//! Locks are cooperative: they keep well-behaved writers (MTAs, mail clients
//! taking an exclusive `flock`) from rewriting the file mid-scan, and do
//! nothing against processes that ignore them. They are unrelated to
//! in-process use of one [`crate::mailbox::Mailbox`], which callers must
//! serialize themselves.

use std::fs::File;
use std::io;
use std::sync::Arc;

use tracing::{debug, warn};

/// Lock capability of a mailbox's stream, fixed at construction.
#[derive(Debug, Clone)]
pub struct SharedLock {
    handle: Option<Arc<File>>,
}

impl SharedLock {
    /// Locking is a no-op.
    pub fn unsupported() -> Self {
        Self { handle: None }
    }

    /// Lock through `handle` (or not at all if `None`).
    pub fn new(handle: Option<File>) -> Self {
        Self {
            handle: handle.map(Arc::new),
        }
    }

    /// Whether acquiring actually takes a lock.
    pub fn is_supported(&self) -> bool {
        self.handle.is_some()
    }

    /// Take a shared lock, released when the returned section is dropped.
    ///
    /// Blocks while another process holds an exclusive lock. If the lock
    /// cannot be taken at all (no locking on this platform, `ENOLCK` on a
    /// network filesystem), the section is unlocked and the scan goes on.
    pub fn acquire(&self) -> LockedSection {
        match &self.handle {
            Some(handle) => section_for(handle.lock_shared(), handle),
            None => LockedSection { handle: None },
        }
    }

    /// Run `body` while holding the lock. The lock is released however
    /// `body` exits, including by panic.
    pub fn with_lock<T>(&self, body: impl FnOnce() -> T) -> T {
        let _section = self.acquire();
        body()
    }
}

fn section_for(outcome: io::Result<()>, handle: &Arc<File>) -> LockedSection {
    match outcome {
        Ok(()) => {
            debug!("Acquired shared lock");
            LockedSection {
                handle: Some(Arc::clone(handle)),
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not take shared lock, scanning unlocked");
            LockedSection { handle: None }
        }
    }
}

/// A held shared lock. Dropping it unlocks.
#[derive(Debug)]
pub struct LockedSection {
    handle: Option<Arc<File>>,
}

impl LockedSection {
    /// Whether this section holds a real lock.
    pub fn is_locked(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for LockedSection {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.unlock() {
                Ok(()) => debug!("Released shared lock"),
                Err(e) => warn!(error = %e, "Failed to release shared lock"),
            }
        }
    }
}
