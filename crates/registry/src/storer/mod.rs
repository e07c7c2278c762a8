//! Durable persistence behind one interface.
//!
//! The registry never talks to a backend directly: it hands complete [`Snapshot`]s to a
//! [`Storer`] and reads one back at startup.

mod json;
mod memory;
#[cfg(feature = "redb")]
mod redb;

pub use json::JsonStorer;
pub use memory::MemoryStorer;
#[cfg(feature = "redb")]
pub use self::redb::RedbStorer;

use crate::error::Result;
use crate::snapshot::Snapshot;
use std::fmt::Debug;

/// A persistence backend for full registry snapshots.
///
/// `flush` replaces the stored state as a whole; a failed flush must leave the previous
/// snapshot readable.
pub trait Storer: Send + Sync + Debug {
    /// Reads the last flushed snapshot. `None` means nothing was ever flushed.
    ///
    /// # Errors
    ///
    /// Any persistence error; a snapshot that cannot be decoded is an error, never `None`.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Durably replaces the stored snapshot with `snapshot`.
    ///
    /// # Errors
    ///
    /// Any persistence error.
    fn flush(&self, snapshot: &Snapshot) -> Result<()>;
}
