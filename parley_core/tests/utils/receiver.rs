use parking_lot::Mutex;
use parley_core::prelude::*;

/// Records every update it is given. While `gate` is held by a test, channel
/// deliveries block inside the receiver.
#[derive(Default)]
pub struct RecordingReceiver {
    pub updates: Mutex<Vec<StateUpdate>>,
    pub gate: Mutex<()>,
    pub filter: Option<Filter>,
}

impl RecordingReceiver {
    pub fn with_filter(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn updates(&self) -> Vec<StateUpdate> {
        self.updates.lock().clone()
    }

    pub fn channels(&self, scope: &Scope) -> Vec<ChannelState> {
        self.updates
            .lock()
            .iter()
            .filter_map(|u| match u {
                StateUpdate::Channel(c) if &c.scope() == scope => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn networks(&self, network: &str) -> Vec<NetworkState> {
        self.updates
            .lock()
            .iter()
            .filter_map(|u| match u {
                StateUpdate::Network(n) if n.network == network => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn saw(&self, scope: &Scope) -> bool {
        self.updates.lock().iter().any(|u| &u.scope() == scope)
    }
}

impl StateReceiver for RecordingReceiver {
    fn update_network(&self, state: NetworkState) {
        self.updates.lock().push(StateUpdate::Network(state));
    }

    fn update_channel(&self, state: ChannelState) {
        let _gate = self.gate.lock();
        self.updates.lock().push(StateUpdate::Channel(state));
    }

    fn filter(&self) -> Option<Filter> {
        self.filter.clone()
    }
}
