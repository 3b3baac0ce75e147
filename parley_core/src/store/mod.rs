//! Contains the [`StateStore`], which owns every scope's event log and latest
//! state, and distributes state changes to a single subscriber.

use crate::broadcast::{self, Listen, Listener, Publisher};
use crate::prelude::*;
use crate::slot::Revision;

use itertools::Itertools;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use std::collections::HashMap;
use std::sync::Arc;

mod delivery;
use delivery::Delivery;

mod filter;
pub use filter::{Filter, FilterSpec};

mod receiver;
pub use receiver::StateReceiver;

/// A state record along with the revision at which it was written
#[derive(Debug)]
struct Versioned<T> {
    revision: Revision,
    state: T,
}

#[derive(Default)]
struct StoreInner {
    logs: HashMap<Scope, EventLog>,
    networks: HashMap<String, Versioned<NetworkState>>,
    channels: HashMap<Scope, Versioned<ChannelState>>,
    /// Bumped on every state write
    revision: Revision,
    subscription: Option<Arc<Delivery>>,
    subscription_count: u64,
}

/// Pending hand-off to the subscriber, prepared under the lock and performed
/// after it is released
type Notification = Option<(Arc<Delivery>, Scope, Revision, StateUpdate)>;

impl StoreInner {
    fn next_revision(&mut self) -> Revision {
        self.revision += 1;
        self.revision
    }

    fn write_network(&mut self, state: NetworkState) -> Notification {
        let revision = self.next_revision();
        self.networks.insert(
            state.network.clone(),
            Versioned {
                revision,
                state: state.clone(),
            },
        );
        self.notification(state.scope(), revision, StateUpdate::Network(state))
    }

    /// Store a channel record, keeping the log-derived fields from the current
    /// record
    fn write_channel(&mut self, mut state: ChannelState) -> Notification {
        let scope = state.scope();
        let (unread, last_event_id) = self.channel_counters(&scope);
        state.unread_count = unread;
        state.last_event_id = last_event_id;
        self.put_channel(scope, state)
    }

    fn put_channel(&mut self, scope: Scope, state: ChannelState) -> Notification {
        let revision = self.next_revision();
        self.channels.insert(
            scope.clone(),
            Versioned {
                revision,
                state: state.clone(),
            },
        );
        self.notification(scope, revision, StateUpdate::Channel(state))
    }

    fn channel_counters(&self, scope: &Scope) -> (usize, EventId) {
        let unread = self
            .channels
            .get(scope)
            .map(|c| c.state.unread_count)
            .unwrap_or(0);
        let last_event_id = self
            .logs
            .get(scope)
            .and_then(EventLog::last_id)
            .unwrap_or(EventId::ZERO);
        (unread, last_event_id)
    }

    /// Current channel record for `scope`, created if this is the first
    /// reference to it
    fn channel_or_new(&self, scope: &Scope) -> ChannelState {
        self.channels
            .get(scope)
            .map(|c| c.state.clone())
            .unwrap_or_else(|| {
                ChannelState::new(scope.network.clone(), scope.name().unwrap_or_default())
            })
    }

    /// Update channel bookkeeping after events were added to `scope`'s log
    fn events_added(&mut self, scope: &Scope, added: usize) -> Notification {
        if scope.is_network() {
            return None;
        }
        let mut state = self.channel_or_new(scope);
        state.unread_count += added;
        state.last_event_id = self
            .logs
            .get(scope)
            .and_then(EventLog::last_id)
            .unwrap_or(EventId::ZERO);
        self.put_channel(scope.clone(), state)
    }

    fn notification(&self, scope: Scope, revision: Revision, update: StateUpdate) -> Notification {
        let delivery = self.subscription.as_ref()?;
        delivery
            .filter()
            .matches(&scope)
            .then(|| (Arc::clone(delivery), scope, revision, update))
    }
}

fn send(notification: Notification) {
    if let Some((delivery, scope, revision, update)) = notification {
        delivery.offer(&scope, revision, update);
    }
}

/// Summary counters for a [`StateStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub scopes: usize,
    pub events: usize,
    pub networks: usize,
    pub channels: usize,
    pub subscribed: bool,
}

/// Owns the event log and latest state record for every scope.
///
/// All reads and writes go through a single lock, held only while the maps are
/// touched. Subscriber delivery happens after the lock is released and never
/// blocks the writer.
pub struct StateStore {
    inner: Mutex<StoreInner>,
    events: Publisher<(Scope, Event)>,
    event_listeners: Listen<(Scope, Event)>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (events, event_listeners) = broadcast::channel();
        Self {
            inner: Mutex::new(StoreInner::default()),
            events,
            event_listeners,
        }
    }

    /// Replace the stored record for a network and notify the subscriber
    pub fn update_network(&self, state: NetworkState) {
        tracing::trace!(network = %state.network, connection = %state.connection, "Network update");
        let notification = self.inner.lock().write_network(state);
        send(notification);
    }

    /// Replace the stored record for a channel and notify the subscriber.
    ///
    /// The record's `unread_count` and `last_event_id` are owned by the store
    /// and keep their current values.
    pub fn update_channel(&self, state: ChannelState) {
        if state.channel.is_empty() {
            tracing::warn!(network = %state.network, "Ignoring channel update with no channel name");
            return;
        }
        tracing::trace!(network = %state.network, channel = %state.channel, "Channel update");
        let notification = self.inner.lock().write_channel(state);
        send(notification);
    }

    /// Append an event to `scope`'s log with the next ID in its current epoch.
    ///
    /// For channel scopes this also counts the event as unread and moves the
    /// channel's `last_event_id` to it.
    pub fn append(&self, scope: &Scope, contents: impl Into<String>) -> Event {
        let (event, notification) = {
            let mut inner = self.inner.lock();
            let event = inner.logs.entry(scope.clone()).or_default().append(contents);
            // Published under the lock so the feed sees each scope's events
            // in log order
            self.events.publish((scope.clone(), event.clone()));
            let notification = inner.events_added(scope, 1);
            (event, notification)
        };
        send(notification);
        event
    }

    /// Append an event carrying its own ID.
    ///
    /// Panics if the ID does not strictly follow the newest event in the log.
    pub fn insert(&self, scope: &Scope, event: Event) {
        let notification = {
            let mut inner = self.inner.lock();
            inner
                .logs
                .entry(scope.clone())
                .or_default()
                .insert(event.clone());
            self.events.publish((scope.clone(), event));
            inner.events_added(scope, 1)
        };
        send(notification);
    }

    /// Merge historical events, in any order, into `scope`'s log. Backfilled
    /// events are not counted as unread. They are published to the event feed
    /// oldest first, so feed listeners may see IDs below ones already seen.
    ///
    /// Panics if an ID is duplicated.
    pub fn backfill(&self, scope: &Scope, events: impl IntoIterator<Item = Event>) {
        let mut events: Vec<Event> = events.into_iter().collect();
        if events.is_empty() {
            return;
        }
        events.sort_by_key(|e| e.id);

        let notification = {
            let mut inner = self.inner.lock();
            let log = inner.logs.entry(scope.clone()).or_default();
            let before = log.last_id();
            log.backfill(events.iter().cloned());
            let moved = log.last_id() != before;

            for event in events {
                self.events.publish((scope.clone(), event));
            }
            if moved {
                inner.events_added(scope, 0)
            } else {
                None
            }
        };
        send(notification);
    }

    /// Start a new epoch in `scope`'s log, typically after a reconnect
    pub fn new_epoch(&self, scope: &Scope) -> Epoch {
        let epoch = self
            .inner
            .lock()
            .logs
            .entry(scope.clone())
            .or_default()
            .new_epoch();
        tracing::debug!(%scope, epoch, "New epoch");
        epoch
    }

    /// Reset a channel's unread count, as after the user has read its backlog
    pub fn mark_read(&self, scope: &Scope) {
        let notification = {
            let mut inner = self.inner.lock();
            let unread = inner
                .channels
                .get(scope)
                .filter(|record| record.state.unread_count > 0)
                .map(|record| record.state.clone());
            unread.and_then(|mut state| {
                state.unread_count = 0;
                inner.put_channel(scope.clone(), state)
            })
        };
        send(notification);
    }

    /// Count as read every event up to and including `upto`. Events after it
    /// stay unread.
    pub fn mark_read_until(&self, scope: &Scope, upto: EventId) {
        let notification = {
            let mut inner = self.inner.lock();
            let after = inner.logs.get(scope).map_or(0, |log| log.count_after(upto));
            let lowered = inner
                .channels
                .get(scope)
                .filter(|record| record.state.unread_count > after)
                .map(|record| record.state.clone());
            lowered.and_then(|mut state| {
                state.unread_count = after;
                inner.put_channel(scope.clone(), state)
            })
        };
        send(notification);
    }

    /// At most `n` events from `scope` with ID not greater than `max`, oldest
    /// first
    pub fn events_before(&self, scope: &Scope, n: usize, max: EventId) -> Vec<Event> {
        self.with_log(scope, |log| log.select_size_max(n, max))
    }

    /// At most `n` events from `scope` with ID not less than `min`, oldest
    /// first
    pub fn events_after(&self, scope: &Scope, min: EventId, n: usize) -> Vec<Event> {
        self.with_log(scope, |log| log.select_min_size(min, n))
    }

    /// All events from `scope` with `min <= id <= max`
    pub fn events_between(&self, scope: &Scope, min: EventId, max: EventId) -> Vec<Event> {
        self.with_log(scope, |log| log.select_min_max(min, max))
    }

    /// The newest `n` events from `scope`
    pub fn latest_events(&self, scope: &Scope, n: usize) -> Vec<Event> {
        self.with_log(scope, |log| log.select_size(n))
    }

    fn with_log(&self, scope: &Scope, f: impl FnOnce(&EventLog) -> Vec<Event>) -> Vec<Event> {
        self.inner.lock().logs.get(scope).map(f).unwrap_or_default()
    }

    pub fn last_event_id(&self, scope: &Scope) -> EventId {
        self.inner
            .lock()
            .logs
            .get(scope)
            .and_then(EventLog::last_id)
            .unwrap_or(EventId::ZERO)
    }

    pub fn log_len(&self, scope: &Scope) -> usize {
        self.inner.lock().logs.get(scope).map_or(0, EventLog::len)
    }

    pub fn network_state(&self, network: &str) -> Option<NetworkState> {
        self.inner
            .lock()
            .networks
            .get(network)
            .map(|n| n.state.clone())
    }

    pub fn channel_state(&self, scope: &Scope) -> Option<ChannelState> {
        self.inner.lock().channels.get(scope).map(|c| c.state.clone())
    }

    /// Every scope with a log or a state record, sorted
    pub fn scopes(&self) -> Vec<Scope> {
        let inner = self.inner.lock();
        inner
            .logs
            .keys()
            .cloned()
            .chain(inner.networks.keys().map(Scope::network))
            .chain(inner.channels.keys().cloned())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            scopes: inner.logs.len(),
            events: inner.logs.values().map(EventLog::len).sum(),
            networks: inner.networks.len(),
            channels: inner.channels.len(),
            subscribed: inner.subscription.is_some(),
        }
    }

    /// Make `receiver` the store's only subscriber, replacing any previous
    /// one.
    ///
    /// `filter` restricts delivery to matching scopes; when absent the
    /// receiver's own [`StateReceiver::filter`] is used, and failing that all
    /// scopes are delivered. The current state of every matching scope is
    /// delivered straight away, followed by changes as they happen.
    ///
    /// Must be called from within a tokio runtime; delivery runs on it.
    pub fn subscribe(&self, receiver: Arc<dyn StateReceiver>, filter: Option<Filter>) {
        let filter = filter
            .or_else(|| receiver.filter())
            .unwrap_or_default();
        let runtime = tokio::runtime::Handle::current();

        let (delivery, resync) = {
            let mut inner = self.inner.lock();
            inner.subscription_count += 1;
            let delivery = Arc::new(Delivery::new(
                inner.subscription_count,
                filter,
                receiver,
                runtime,
            ));

            let networks = inner.networks.values().map(|n| {
                (
                    n.state.scope(),
                    n.revision,
                    StateUpdate::Network(n.state.clone()),
                )
            });
            let channels = inner.channels.iter().map(|(scope, c)| {
                (
                    scope.clone(),
                    c.revision,
                    StateUpdate::Channel(c.state.clone()),
                )
            });
            let resync = networks
                .chain(channels)
                .filter(|(scope, _, _)| delivery.filter().matches(scope))
                .sorted_by(|a, b| a.0.cmp(&b.0))
                .collect_vec();

            if let Some(previous) = inner.subscription.replace(Arc::clone(&delivery)) {
                tracing::debug!(previous = previous.id(), "Replacing subscriber");
                previous.close();
            }
            (delivery, resync)
        };

        tracing::debug!(
            subscription = delivery.id(),
            filter = ?delivery.filter(),
            resync = resync.len(),
            "New subscriber"
        );

        for (scope, revision, update) in resync {
            delivery.offer(&scope, revision, update);
        }
    }

    /// Drop the current subscriber, if any
    pub fn unsubscribe(&self) {
        if let Some(previous) = self.inner.lock().subscription.take() {
            tracing::debug!(subscription = previous.id(), "Unsubscribed");
            previous.close();
        }
    }

    /// Attach a listener to the feed of newly appended events, across all
    /// scopes. Any number of feeds may be attached.
    pub fn listen_events(&self, cancel: CancellationToken) -> Listener<(Scope, Event)> {
        self.event_listeners.listen(cancel)
    }
}

#[cfg(test)]
mod tests;
