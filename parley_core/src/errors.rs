//! Defines errors returned by the other modules

use crate::id::EventId;
use thiserror::Error;

/// A violation of an event log's ordering invariant. These indicate a bug in
/// the producer; callers that cannot handle them should use the panicking
/// variants of the insert operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Event {new} does not follow {last}")]
    OutOfOrder { last: EventId, new: EventId },
    #[error("Duplicate event id {0}")]
    Duplicate(EventId),
    #[error("No sequence numbers left in the epoch of {0}")]
    SequenceExhausted(EventId),
}

/// Convenience definition of a Result type for ordered inserts
pub type OrderResult<T> = std::result::Result<T, OrderError>;
