//! Defines the event identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discontinuity counter within a scope's event ordering. Negative epochs hold
/// history from before live tracking began.
pub type Epoch = i64;

/// Position of an event within its epoch
pub type Sequence = u64;

/// Identifies an event within a scope.
///
/// Ordering is total: epochs are compared first, then sequence numbers. The
/// derived `Ord` relies on the field order below.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventId {
    epoch: Epoch,
    seq: Sequence,
}

impl EventId {
    /// Reserved as "no event". Never assigned by [`EventLog::append`](crate::log::EventLog::append).
    pub const ZERO: EventId = EventId { epoch: 0, seq: 0 };

    /// Compares greater than or equal to every other ID
    pub const MAX: EventId = EventId {
        epoch: Epoch::MAX,
        seq: Sequence::MAX,
    };

    /// Compares less than or equal to every other ID
    pub const MIN: EventId = EventId {
        epoch: Epoch::MIN,
        seq: 0,
    };

    /// The epoch in which live tracking starts
    pub const FIRST_LIVE_EPOCH: Epoch = 1;

    pub const fn new(epoch: Epoch, seq: Sequence) -> Self {
        Self { epoch, seq }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn seq(&self) -> Sequence {
        self.seq
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// The ID directly following this one in the same epoch, or `None` if
    /// the epoch's sequence numbers are used up
    pub fn checked_next(&self) -> Option<Self> {
        Some(Self {
            epoch: self.epoch,
            seq: self.seq.checked_add(1)?,
        })
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.seq)
    }
}

impl From<(Epoch, Sequence)> for EventId {
    fn from((epoch, seq): (Epoch, Sequence)) -> Self {
        Self::new(epoch, seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_dominates_sequence() {
        assert!(EventId::new(1, 0) > EventId::new(0, 500));
        assert!(EventId::new(-1, 9) < EventId::new(0, 0));
        assert!(EventId::new(2, 3) < EventId::new(2, 4));
    }

    #[test]
    fn bounds() {
        assert!(EventId::MIN <= EventId::new(-40, 0));
        assert!(EventId::MAX > EventId::new(12, 7));
        assert!(EventId::ZERO < EventId::new(EventId::FIRST_LIVE_EPOCH, 1));
    }

    #[test]
    fn next_in_epoch() {
        assert_eq!(EventId::new(2, 7).checked_next(), Some(EventId::new(2, 8)));
        assert_eq!(EventId::new(2, Sequence::MAX).checked_next(), None);
    }

    #[test]
    fn display() {
        assert_eq!(EventId::new(-2, 17).to_string(), "-2:17");
    }
}
