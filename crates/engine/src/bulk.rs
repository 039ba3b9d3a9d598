//! Single-slot gate for bundle and cable fills.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admits at most one bulk operation at a time.
///
/// A second fill, or a structure switch, is rejected rather than queued while
/// a permit is out.
#[derive(Clone, Debug)]
pub struct BulkOperationCoordinator {
    slot: Arc<Semaphore>,
}

/// Held for the duration of a bulk operation; the slot frees on drop.
#[derive(Debug)]
pub struct BulkPermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for BulkOperationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkOperationCoordinator {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_begin(&self) -> Option<BulkPermit> {
        Arc::clone(&self.slot)
            .try_acquire_owned()
            .ok()
            .map(|permit| BulkPermit { _permit: permit })
    }

    pub fn in_progress(&self) -> bool {
        self.slot.available_permits() == 0
    }
}
