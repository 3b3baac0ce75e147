use crate::id::EventId;
use serde::{Deserialize, Serialize};

/// A single entry in a scope's event log. Never mutated once appended; the log
/// hands out copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub contents: String,
}

impl Event {
    pub fn new(id: impl Into<EventId>, contents: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contents: contents.into(),
        }
    }
}
