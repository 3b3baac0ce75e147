use crate::prelude::*;

/// Implemented by consumers of state updates.
///
/// Methods are called from the store's delivery tasks, one task per scope, so
/// they should return quickly; a receiver that needs to do slow work should
/// hand it off. Updates for one scope arrive in the order they were written,
/// though intermediate states may be skipped.
pub trait StateReceiver: Send + Sync + 'static {
    fn update_network(&self, state: NetworkState);

    fn update_channel(&self, state: ChannelState);

    /// Filter to apply when subscribing without an explicit one
    fn filter(&self) -> Option<Filter> {
        None
    }
}
