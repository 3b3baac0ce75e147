//! A single-slot, "latest wins" hand-off between a producer and one draining
//! task.

use arc_swap::ArcSwapOption;
use tokio::sync::Notify;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Monotonic version attached to each offered value
pub type Revision = u64;

#[derive(Debug)]
struct Versioned<T> {
    revision: Revision,
    value: T,
}

/// Holds at most one pending value.
///
/// Offering a newer value replaces whatever is pending; offering a value no
/// newer than the pending or last taken one is ignored. Revisions therefore
/// only move forward from the drainer's point of view, however the offers
/// race each other. Exactly one task is expected to drain the slot.
#[derive(Debug)]
pub struct LatestSlot<T> {
    pending: ArcSwapOption<Versioned<T>>,
    taken: AtomicU64,
    wake: Notify,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            pending: ArcSwapOption::empty(),
            taken: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    /// Offer a value. Returns whether it is now the pending value.
    pub fn offer(&self, revision: Revision, value: T) -> bool {
        if revision <= self.taken.load(Ordering::Acquire) {
            return false;
        }

        let offered = Arc::new(Versioned { revision, value });
        let previous = self.pending.rcu(|current| match current {
            Some(pending) if pending.revision >= revision => Some(Arc::clone(pending)),
            _ => Some(Arc::clone(&offered)),
        });

        let accepted = previous
            .as_ref()
            .map_or(true, |pending| pending.revision < revision);

        if accepted {
            self.wake.notify_one();
        }
        accepted
    }

    /// Wait until an offer has been accepted since the last wait. A single
    /// wake may stand for any number of offers.
    pub async fn changed(&self) {
        self.wake.notified().await
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load().is_some()
    }

    /// Revision of the newest value handed out by [`take`](Self::take)
    pub fn taken_revision(&self) -> Revision {
        self.taken.load(Ordering::Acquire)
    }
}

impl<T: Clone> LatestSlot<T> {
    /// Remove and return the pending value, if it is newer than anything
    /// previously taken
    pub fn take(&self) -> Option<(Revision, T)> {
        loop {
            let pending = self.pending.swap(None)?;
            let previous = self.taken.fetch_max(pending.revision, Ordering::AcqRel);
            if pending.revision > previous {
                let revision = pending.revision;
                let value = Arc::try_unwrap(pending)
                    .map(|v| v.value)
                    .unwrap_or_else(|shared| shared.value.clone());
                return Some((revision, value));
            }
        }
    }
}
