//! Stream access: input resources, advisory locking, and the scan cursor.

pub mod cursor;
pub mod lock;
pub mod stream;
