//! Per-subscription delivery lanes

use crate::prelude::*;
use crate::slot::{LatestSlot, Revision};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use std::collections::HashMap;
use std::sync::Arc;

type Lane = LatestSlot<StateUpdate>;

/// Everything belonging to one subscription.
///
/// Each scope that passes the filter gets its own lane: a [`LatestSlot`] and
/// a task draining it into the receiver. Lanes never wait on each other, so a
/// slow receiver call for one channel can't delay another.
pub(super) struct Delivery {
    id: u64,
    filter: Filter,
    receiver: Arc<dyn StateReceiver>,
    runtime: Handle,
    cancel: CancellationToken,
    lanes: Mutex<HashMap<Scope, Arc<Lane>>>,
}

impl Delivery {
    pub(super) fn new(
        id: u64,
        filter: Filter,
        receiver: Arc<dyn StateReceiver>,
        runtime: Handle,
    ) -> Self {
        Self {
            id,
            filter,
            receiver,
            runtime,
            cancel: CancellationToken::new(),
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Hand `update` to its scope's lane without waiting. Updates not passing
    /// the filter, or older than what the lane has already seen, are dropped.
    pub(super) fn offer(&self, scope: &Scope, revision: Revision, update: StateUpdate) {
        if self.cancel.is_cancelled() || !self.filter.matches(scope) {
            return;
        }

        let lane = {
            let mut lanes = self.lanes.lock();
            match lanes.get(scope) {
                Some(lane) => Arc::clone(lane),
                None => {
                    let lane = self.spawn_lane(scope.clone());
                    lanes.insert(scope.clone(), Arc::clone(&lane));
                    lane
                }
            }
        };

        if !lane.offer(revision, update) {
            tracing::trace!(subscription = self.id, %scope, revision, "Dropped stale update");
        }
    }

    fn spawn_lane(&self, scope: Scope) -> Arc<Lane> {
        let lane = Arc::new(Lane::new());
        self.runtime.spawn(run_lane(
            self.id,
            scope,
            Arc::clone(&lane),
            Arc::clone(&self.receiver),
            self.cancel.clone(),
        ));
        lane
    }

    /// Stop all lanes. Updates already handed to the receiver are unaffected.
    pub(super) fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[instrument(skip_all, fields(subscription = id, scope = %scope))]
async fn run_lane(
    id: u64,
    scope: Scope,
    lane: Arc<Lane>,
    receiver: Arc<dyn StateReceiver>,
    cancel: CancellationToken,
) {
    tracing::trace!("Delivery lane started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = lane.changed() => (),
        }

        // Re-check after every delivery; anything offered meanwhile replaced
        // the pending value and is picked up here
        while let Some((revision, update)) = lane.take() {
            if cancel.is_cancelled() {
                break;
            }
            tracing::trace!(revision, "Delivering update");
            update.deliver_to(&*receiver);
        }
    }

    tracing::trace!("Delivery lane stopped");
}
