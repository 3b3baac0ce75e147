//! Demo producer generating simulated chat traffic

use crate::config::{DemoConfig, DemoNetwork};
use parley_core::prelude::*;

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use std::{sync::Arc, time::Duration};

const SPEAKERS: &[&str] = &[
    "hamlet", "ophelia", "horatio", "polonius", "laertes", "gertrude", "claudius", "yorick",
];

const LINES: &[&str] = &[
    "Who's there?",
    "Nay, answer me: stand, and unfold yourself.",
    "Something is rotten in the state of Denmark.",
    "The rest is silence.",
    "Though this be madness, yet there is method in't.",
    "Brevity is the soul of wit.",
    "There are more things in heaven and earth, Horatio.",
    "The lady doth protest too much, methinks.",
    "To thine own self be true.",
    "Alas, poor Yorick!",
];

const TOPICS: &[&str] = &[
    "Act I: the battlements",
    "Act II: a room in the castle",
    "Act III: the play's the thing",
    "Act IV: a plain in Denmark",
    "Act V: a churchyard",
];

/// Summary of what a generator produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Produced {
    pub messages: usize,
    pub reconnects: usize,
    pub topic_changes: usize,
}

/// Pushes simulated traffic for the configured networks into a store
pub struct Generator {
    store: Arc<StateStore>,
    networks: Vec<DemoNetwork>,
    interval: Duration,
    message_count: usize,
    backfill: usize,
    reconnect_every: usize,
    rng: StdRng,
}

impl Generator {
    pub fn new(store: Arc<StateStore>, config: &DemoConfig) -> Self {
        Self {
            store,
            networks: config.networks.clone(),
            interval: Duration::from_millis(config.interval_ms),
            message_count: config.message_count,
            backfill: config.backfill,
            reconnect_every: config.reconnect_every,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed, for reproducible traffic
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn chat_line(&mut self) -> String {
        let speaker = SPEAKERS.choose(&mut self.rng).copied().unwrap_or("anonymous");
        let line = LINES.choose(&mut self.rng).copied().unwrap_or("...");
        format!(
            "{} <{}> {}",
            chrono::Local::now().format("%H:%M:%S"),
            speaker,
            line
        )
    }

    /// Load some history from before live tracking into every channel. Each
    /// channel gets `backfill` events in epoch -1, supplied newest first.
    pub fn load_history(&mut self) {
        if self.backfill == 0 {
            return;
        }

        let scopes: Vec<Scope> = self.networks.iter().flat_map(|n| n.scopes()).collect();
        for scope in scopes {
            let history: Vec<Event> = (1..=self.backfill as Sequence)
                .rev()
                .map(|seq| Event::new((-1, seq), format!("[history] {}", self.chat_line())))
                .collect();
            self.store.backfill(&scope, history);
        }
        tracing::debug!(per_channel = self.backfill, "Loaded history");
    }

    /// Bring a network to the connected state and join all its channels
    fn connect(&mut self, network: &DemoNetwork) {
        let mut state = NetworkState::new(network.name.clone(), network.nick.clone());
        state.connection = ConnectionState::Connecting;
        self.store.update_network(state.clone());

        self.store.append(
            &Scope::network(network.name.clone()),
            format!("*** Connecting to {} as {}", network.name, network.nick),
        );

        state.connection = ConnectionState::Connected;
        self.store.update_network(state);

        for scope in network.scopes() {
            let mut channel =
                ChannelState::new(network.name.clone(), scope.name().unwrap_or_default());
            channel.presence = Presence::Joined;
            channel.channel_mode = "+nt".to_string();
            channel.topic = TOPICS.choose(&mut self.rng).copied().unwrap_or_default().to_string();
            channel.member_count = self.rng.gen_range(2..40);
            self.store.update_channel(channel);

            self.store
                .append(&scope, format!("*** {} has joined {}", network.nick, scope));
        }
    }

    /// Drop and re-establish a network's connection. Every scope on the
    /// network starts a new epoch.
    fn reconnect(&mut self, network: &DemoNetwork) {
        tracing::info!(network = %network.name, "Simulating reconnect");

        self.store.update_network(NetworkState::new(
            network.name.clone(),
            network.nick.clone(),
        ));
        for scope in network.scopes() {
            if let Some(mut channel) = self.store.channel_state(&scope) {
                channel.presence = Presence::NotPresent;
                self.store.update_channel(channel);
            }
            self.store.new_epoch(&scope);
        }
        self.store.new_epoch(&Scope::network(network.name.clone()));

        self.connect(network);
    }

    fn change_topic(&mut self, scope: &Scope) {
        if let Some(mut channel) = self.store.channel_state(scope) {
            channel.topic = TOPICS.choose(&mut self.rng).copied().unwrap_or_default().to_string();
            let topic = channel.topic.clone();
            self.store.update_channel(channel);
            self.store
                .append(scope, format!("*** Topic changed to: {}", topic));
        }
    }

    /// Generate traffic until the configured message count is reached or
    /// `cancel` fires
    #[instrument(skip_all)]
    pub async fn run(mut self, cancel: CancellationToken) -> Produced {
        let mut produced = Produced::default();

        let networks = self.networks.clone();
        for network in &networks {
            self.connect(network);
        }

        let scopes: Vec<Scope> = networks.iter().flat_map(|n| n.scopes()).collect();
        if scopes.is_empty() {
            tracing::warn!("No channels configured; nothing to generate");
            return produced;
        }

        while produced.messages < self.message_count {
            if !self.interval.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => (),
                }
            } else if cancel.is_cancelled() {
                break;
            }

            let Some(scope) = scopes.choose(&mut self.rng).cloned() else {
                break;
            };

            if self.rng.gen_ratio(1, 10) {
                self.change_topic(&scope);
                produced.topic_changes += 1;
            }

            let line = self.chat_line();
            let event = self.store.append(&scope, line);
            tracing::trace!(%scope, id = %event.id, "Generated message");
            produced.messages += 1;

            if self.reconnect_every > 0 && produced.messages % self.reconnect_every == 0 {
                if let Some(network) = networks.iter().find(|n| n.name == scope.network) {
                    self.reconnect(network);
                    produced.reconnects += 1;
                }
            }

            if self.interval.is_zero() {
                tokio::task::yield_now().await;
            }
        }

        tracing::info!(
            messages = produced.messages,
            reconnects = produced.reconnects,
            topic_changes = produced.topic_changes,
            "Generator finished"
        );
        produced
    }
}
