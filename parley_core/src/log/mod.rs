//! Contains the per-scope event log

use crate::prelude::*;

/// An ordered, append-only collection of events for one scope.
///
/// Events are kept strictly increasing by [`EventId`], which lets every range
/// query locate its boundaries by binary search. The log has no locking of its
/// own; [`StateStore`] serialises access to the logs it owns.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    epoch: Epoch,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Construct an empty log whose appends start in the first live epoch
    pub fn new() -> Self {
        Self::with_epoch(EventId::FIRST_LIVE_EPOCH)
    }

    /// Construct an empty log whose appends start in `epoch`
    pub fn with_epoch(epoch: Epoch) -> Self {
        Self {
            events: Vec::new(),
            epoch,
        }
    }

    /// The epoch that the next appended event will belong to
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// ID of the newest event in the log, if any
    pub fn last_id(&self) -> Option<EventId> {
        self.events.last().map(|e| e.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Start a new epoch. The next append will be the first event in it.
    pub fn new_epoch(&mut self) -> Epoch {
        self.epoch += 1;
        tracing::debug!(epoch = self.epoch, "Starting new event log epoch");
        self.epoch
    }

    /// Append an event with the next ID in the current epoch and return a copy
    /// of it.
    ///
    /// Sequence numbers start at 1 in each epoch; `(0, 0)` stays free to mean
    /// "no event".
    pub fn append(&mut self, contents: impl Into<String>) -> Event {
        let id = match self.events.last() {
            Some(last) if last.id.epoch() == self.epoch => match last.id.checked_next() {
                Some(id) => id,
                None => panic!(
                    "Event log ordering violated: {}",
                    OrderError::SequenceExhausted(last.id)
                ),
            },
            _ => EventId::new(self.epoch, 1),
        };
        let event = Event::new(id, contents);
        tracing::trace!(%id, "Appending event");
        self.events.push(event.clone());
        event
    }

    /// Append an event which carries its own ID, failing if it does not
    /// strictly follow the newest event already in the log.
    pub fn try_insert(&mut self, event: Event) -> OrderResult<()> {
        if let Some(last) = self.last_id() {
            if event.id == last {
                return Err(OrderError::Duplicate(event.id));
            }
            if event.id < last {
                return Err(OrderError::OutOfOrder {
                    last,
                    new: event.id,
                });
            }
        }
        self.epoch = self.epoch.max(event.id.epoch());
        self.events.push(event);
        Ok(())
    }

    /// As [`try_insert`](Self::try_insert), but an ordering violation is
    /// treated as a fatal bug in the producer.
    pub fn insert(&mut self, event: Event) {
        if let Err(e) = self.try_insert(event) {
            panic!("Event log ordering violated: {}", e);
        }
    }

    /// Merge a batch of events, in any order, into the log. The result is
    /// re-sorted before it is next queried.
    ///
    /// Panics if any ID appears twice.
    pub fn backfill(&mut self, events: impl IntoIterator<Item = Event>) {
        let before = self.events.len();
        self.events.extend(events);
        self.events.sort_by_key(|e| e.id);

        if let Some(pair) = self.events.windows(2).find(|w| w[0].id == w[1].id) {
            panic!(
                "Event log ordering violated: {}",
                OrderError::Duplicate(pair[0].id)
            );
        }
        if let Some(last) = self.last_id() {
            self.epoch = self.epoch.max(last.epoch());
        }

        tracing::debug!(added = self.events.len() - before, "Backfilled event log");
    }

    /// Index of the first event whose ID is not less than `id`
    fn lower_bound(&self, id: EventId) -> usize {
        self.events.partition_point(|e| e.id < id)
    }

    /// Index of the first event whose ID is greater than `id`
    fn upper_bound(&self, id: EventId) -> usize {
        self.events.partition_point(|e| e.id <= id)
    }

    /// Number of events with ID greater than `id`
    pub fn count_after(&self, id: EventId) -> usize {
        self.events.len() - self.upper_bound(id)
    }

    /// The most recent `n` events, oldest first
    pub fn select_size(&self, n: usize) -> Vec<Event> {
        let start = self.events.len().saturating_sub(n);
        self.events[start..].to_vec()
    }

    /// At most `n` events with ID not greater than `max`, ending at the
    /// largest such ID, oldest first
    pub fn select_size_max(&self, n: usize, max: EventId) -> Vec<Event> {
        let end = self.upper_bound(max);
        let start = end.saturating_sub(n);
        self.events[start..end].to_vec()
    }

    /// At most `n` events with ID not less than `min`, starting at the
    /// smallest such ID, oldest first
    pub fn select_min_size(&self, min: EventId, n: usize) -> Vec<Event> {
        let start = self.lower_bound(min);
        let end = start.saturating_add(n).min(self.events.len());
        self.events[start..end].to_vec()
    }

    /// All events with `min <= id <= max`
    pub fn select_min_max(&self, min: EventId, max: EventId) -> Vec<Event> {
        let start = self.lower_bound(min);
        let end = self.upper_bound(max);
        if start >= end {
            return Vec::new();
        }
        self.events[start..end].to_vec()
    }
}
