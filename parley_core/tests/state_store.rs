use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use parley_core::prelude::*;

mod utils;
use utils::{eventually, receiver::RecordingReceiver};

fn channel_with_topic(network: &str, channel: &str, topic: &str) -> ChannelState {
    let mut state = ChannelState::new(network, channel);
    state.topic = topic.to_string();
    state
}

#[tokio::test]
async fn updates_reach_subscriber() {
    utils::init_logging();
    let store = StateStore::new();
    let receiver = Arc::new(RecordingReceiver::default());
    store.subscribe(receiver.clone(), None);

    let mut network = NetworkState::new("HamNet", "horatio");
    network.connection = ConnectionState::Connecting;
    store.update_network(network.clone());
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "Act I"));

    eventually("both updates", || receiver.updates().len() == 2).await;
    assert_eq!(receiver.networks("HamNet"), vec![network]);
    assert_eq!(
        receiver.channels(&Scope::channel("HamNet", "#hamlet"))[0].topic,
        "Act I"
    );
}

#[tokio::test]
async fn no_subscriber_is_a_no_op() {
    let store = StateStore::new();
    store.update_network(NetworkState::new("HamNet", "horatio"));
    store.append(&Scope::channel("HamNet", "#hamlet"), "nobody listening");
    store.unsubscribe();
    assert!(!store.stats().subscribed);
}

#[tokio::test]
async fn network_filter_scenario() {
    let store = StateStore::new();
    let receiver = Arc::new(RecordingReceiver::default());
    let filter: Filter = FilterSpec {
        match_network: true,
        match_name: false,
        scope: Scope::network("HamNet"),
    }
    .into();
    store.subscribe(receiver.clone(), Some(filter));

    store.update_network(NetworkState::new("OtherNet", "yorick"));
    store.update_channel(channel_with_topic("HamNet", "#other", "delivered"));

    let other = Scope::channel("HamNet", "#other");
    eventually("#other update", || receiver.saw(&other)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!receiver.saw(&Scope::network("OtherNet")));
}

#[tokio::test]
async fn receiver_supplied_filter_is_used() {
    let store = StateStore::new();
    let hamlet = Scope::channel("HamNet", "#hamlet");
    let receiver = Arc::new(RecordingReceiver::with_filter(Filter::ByChannel(
        hamlet.clone(),
    )));
    store.subscribe(receiver.clone(), None);

    store.update_network(NetworkState::new("HamNet", "horatio"));
    store.update_channel(channel_with_topic("HamNet", "#other", "no"));
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "yes"));

    eventually("#hamlet update", || receiver.saw(&hamlet)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(receiver.updates().len(), 1);
}

#[tokio::test]
async fn subscribe_resyncs_current_state() {
    let store = StateStore::new();
    store.update_network(NetworkState::new("HamNet", "horatio"));
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "old"));
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "current"));
    store.update_channel(channel_with_topic("HamNet", "#other", "other"));
    store.update_network(NetworkState::new("OtherNet", "yorick"));

    let receiver = Arc::new(RecordingReceiver::default());
    store.subscribe(
        receiver.clone(),
        Some(Filter::ByNetwork("HamNet".to_string())),
    );

    eventually("resync", || receiver.updates().len() == 3).await;
    let hamlet = receiver.channels(&Scope::channel("HamNet", "#hamlet"));
    assert_eq!(hamlet.len(), 1);
    assert_eq!(hamlet[0].topic, "current");
    assert_eq!(receiver.networks("HamNet").len(), 1);
    assert!(receiver.networks("OtherNet").is_empty());

    // Deltas follow the resync
    store.update_channel(channel_with_topic("HamNet", "#other", "changed"));
    eventually("delta", || receiver.updates().len() == 4).await;
}

#[tokio::test]
async fn resubscribing_replaces_the_subscriber() {
    let store = StateStore::new();
    let first = Arc::new(RecordingReceiver::default());
    let second = Arc::new(RecordingReceiver::default());

    store.subscribe(first.clone(), None);
    store.update_network(NetworkState::new("HamNet", "horatio"));
    eventually("first delivery", || first.updates().len() == 1).await;

    store.subscribe(second.clone(), None);
    let mut renamed = NetworkState::new("HamNet", "hamlet");
    renamed.connection = ConnectionState::Connected;
    store.update_network(renamed.clone());

    eventually("second subscriber", || {
        second.networks("HamNet").last() == Some(&renamed)
    })
    .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(first.updates().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_delivery_coalesces_to_latest() {
    let store = StateStore::new();
    let receiver = Arc::new(RecordingReceiver::default());
    store.subscribe(receiver.clone(), None);
    let scope = Scope::channel("HamNet", "#hamlet");

    let gate = receiver.gate.lock();
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "u1"));
    // Give the lane a chance to pick up u1 and block in the receiver
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "u2"));
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "u3"));
    drop(gate);

    eventually("u3", || {
        receiver.channels(&scope).last().map(|c| c.topic.clone()) == Some("u3".to_string())
    })
    .await;

    let seen: Vec<String> = receiver
        .channels(&scope)
        .into_iter()
        .map(|c| c.topic)
        .collect();
    assert!(seen.len() <= 2, "expected coalescing, saw {:?}", seen);
    assert!(!seen.contains(&"u2".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_scope_does_not_delay_others() {
    let store = StateStore::new();
    let receiver = Arc::new(RecordingReceiver::default());
    store.subscribe(receiver.clone(), None);

    // Channel deliveries block on the gate; network deliveries do not
    let gate = receiver.gate.lock();
    store.update_channel(channel_with_topic("HamNet", "#hamlet", "stuck"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.update_network(NetworkState::new("HamNet", "horatio"));

    eventually("network update", || !receiver.networks("HamNet").is_empty()).await;
    assert!(receiver.channels(&Scope::channel("HamNet", "#hamlet")).is_empty());
    drop(gate);

    eventually("channel update", || {
        !receiver
            .channels(&Scope::channel("HamNet", "#hamlet"))
            .is_empty()
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_regress() {
    let store = Arc::new(StateStore::new());
    let receiver = Arc::new(RecordingReceiver::default());
    store.subscribe(receiver.clone(), None);
    let scope = Scope::channel("HamNet", "#hamlet");

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let scope = scope.clone();
            tokio::spawn(async move {
                for _ in 0..250 {
                    store.append(&scope, "line");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let last = store.last_event_id(&scope);
    assert_eq!(last, EventId::new(1, 1000));
    eventually("final state", || {
        receiver.channels(&scope).last().map(|c| c.last_event_id) == Some(last)
    })
    .await;

    let seen: Vec<EventId> = receiver
        .channels(&scope)
        .iter()
        .map(|c| c.last_event_id)
        .collect();
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}
