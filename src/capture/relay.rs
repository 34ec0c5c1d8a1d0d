//! Single-slot, latest-wins handoff between the capture and render contexts.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Mailbox of capacity one.
///
/// `push` never blocks and replaces any unconsumed value; `take` never blocks
/// and empties the slot. The lock is held only for the swap itself.
#[derive(Debug)]
pub struct FrameRelay<T> {
    slot: Mutex<Option<T>>,
    replaced: AtomicU64,
}

impl<T> Default for FrameRelay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameRelay<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            replaced: AtomicU64::new(0),
        }
    }

    /// Offer a value, discarding whatever was waiting.
    pub fn push(&self, value: T) {
        let stale = self.slot.lock().replace(value);
        // Dropped outside the lock: frames can own GPU-sized buffers.
        if stale.is_some() {
            self.replaced.fetch_add(1, Ordering::Relaxed);
            drop(stale);
        }
    }

    /// Remove and return the waiting value, if any.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Whether a value is waiting.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Number of values discarded by a newer `push` since creation.
    pub fn replaced_count(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }
}
