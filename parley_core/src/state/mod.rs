//! Latest-known state records for networks and channels

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Connection state of a network
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Whether we are in a channel
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Presence {
    #[default]
    NotPresent,
    Joined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub network: String,
    pub nick: String,
    pub connection: ConnectionState,
}

impl NetworkState {
    pub fn new(network: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            nick: nick.into(),
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::network(self.network.clone())
    }
}

/// State of one channel.
///
/// `unread_count` and `last_event_id` are maintained by the [`StateStore`]
/// from the channel's event log; values supplied by a producer are replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub network: String,
    pub channel: String,
    pub presence: Presence,
    pub channel_mode: String,
    pub user_mode: String,
    pub topic: String,
    pub member_count: usize,
    pub unread_count: usize,
    pub last_event_id: EventId,
}

impl ChannelState {
    pub fn new(network: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            channel: channel.into(),
            presence: Presence::NotPresent,
            channel_mode: String::new(),
            user_mode: String::new(),
            topic: String::new(),
            member_count: 0,
            unread_count: 0,
            last_event_id: EventId::ZERO,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::channel(self.network.clone(), self.channel.clone())
    }
}

/// A state record on its way to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    Network(NetworkState),
    Channel(ChannelState),
}

impl StateUpdate {
    pub fn scope(&self) -> Scope {
        match self {
            Self::Network(state) => state.scope(),
            Self::Channel(state) => state.scope(),
        }
    }

    /// Hand this update to the matching receiver method
    pub fn deliver_to(self, receiver: &dyn StateReceiver) {
        match self {
            Self::Network(state) => receiver.update_network(state),
            Self::Channel(state) => receiver.update_channel(state),
        }
    }
}
