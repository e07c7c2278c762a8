use super::Storer;
use crate::error::Result;
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use std::sync::Arc;

/// Keeps the last flushed snapshot in memory.
///
/// Clones share the same slot, so a test can keep one handle and reopen a registry from
/// another to observe what was flushed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorer {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl MemoryStorer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last flushed snapshot, if any.
    #[must_use]
    pub fn last(&self) -> Option<Snapshot> {
        self.slot.lock().clone()
    }
}

impl Storer for MemoryStorer {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.last())
    }

    fn flush(&self, snapshot: &Snapshot) -> Result<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}
