use super::*;
use pretty_assertions::assert_eq;

fn hamlet() -> Scope {
    Scope::channel("HamNet", "#hamlet")
}

#[test]
fn append_tracks_last_event_and_unread() {
    let store = StateStore::new();
    let scope = hamlet();

    assert_eq!(store.last_event_id(&scope), EventId::ZERO);
    assert!(store.channel_state(&scope).is_none());

    let first = store.append(&scope, "to be");
    let second = store.append(&scope, "or not to be");
    assert!(first.id < second.id);

    let state = store.channel_state(&scope).unwrap();
    assert_eq!(state.last_event_id, second.id);
    assert_eq!(state.unread_count, 2);
    assert_eq!(store.last_event_id(&scope), second.id);
}

#[test]
fn producer_cannot_overwrite_log_derived_fields() {
    let store = StateStore::new();
    let scope = hamlet();
    let last = store.append(&scope, "hello").id;

    let mut update = ChannelState::new("HamNet", "#hamlet");
    update.topic = "Something is rotten".to_string();
    update.unread_count = 99;
    update.last_event_id = EventId::new(40, 40);
    store.update_channel(update);

    let state = store.channel_state(&scope).unwrap();
    assert_eq!(state.topic, "Something is rotten");
    assert_eq!(state.unread_count, 1);
    assert_eq!(state.last_event_id, last);
}

#[test]
fn mark_read_resets_unread_only() {
    let store = StateStore::new();
    let scope = hamlet();
    store.append(&scope, "a");
    store.append(&scope, "b");
    store.mark_read(&scope);

    let state = store.channel_state(&scope).unwrap();
    assert_eq!(state.unread_count, 0);
    assert_eq!(state.last_event_id, EventId::new(1, 2));

    store.append(&scope, "c");
    assert_eq!(store.channel_state(&scope).unwrap().unread_count, 1);
}

#[test]
fn events_before_is_a_pure_query() {
    let store = StateStore::new();
    let scope = hamlet();
    for seq in 1..=6 {
        store.insert(&scope, Event::new((1, seq), format!("line {}", seq)));
    }

    let window = store.events_before(&scope, 3, EventId::new(1, 6));
    let ids: Vec<_> = window.iter().map(|e| e.id).collect();
    assert_eq!(
        ids,
        vec![EventId::new(1, 4), EventId::new(1, 5), EventId::new(1, 6)]
    );
    assert_eq!(store.channel_state(&scope).unwrap().unread_count, 6);
}

#[test]
fn unknown_scope_queries_are_empty() {
    let store = StateStore::new();
    let scope = Scope::channel("Nowhere", "#void");
    assert!(store.events_before(&scope, 10, EventId::MAX).is_empty());
    assert!(store.events_after(&scope, EventId::MIN, 10).is_empty());
    assert!(store
        .events_between(&scope, EventId::MIN, EventId::MAX)
        .is_empty());
    assert!(store.latest_events(&scope, 10).is_empty());
    assert_eq!(store.log_len(&scope), 0);
}

#[test]
fn network_scope_events_do_not_create_channels() {
    let store = StateStore::new();
    let scope = Scope::network("HamNet");
    store.append(&scope, "*** Looking up your hostname");

    assert_eq!(store.log_len(&scope), 1);
    assert_eq!(store.stats().channels, 0);
}

#[test]
fn new_epoch_after_reconnect() {
    let store = StateStore::new();
    let scope = hamlet();
    store.append(&scope, "before");
    assert_eq!(store.new_epoch(&scope), 2);
    let after = store.append(&scope, "after");

    assert_eq!(after.id, EventId::new(2, 1));
    assert_eq!(store.channel_state(&scope).unwrap().last_event_id, after.id);
}

#[test]
fn backfill_does_not_count_unread() {
    let store = StateStore::new();
    let scope = hamlet();
    store.append(&scope, "live");
    store.backfill(
        &scope,
        vec![Event::new((-1, 2), "old 2"), Event::new((-1, 1), "old 1")],
    );

    assert_eq!(store.log_len(&scope), 3);
    assert_eq!(
        store.latest_events(&scope, 3)[0].id,
        EventId::new(-1, 1)
    );
    let state = store.channel_state(&scope).unwrap();
    assert_eq!(state.unread_count, 1);
    assert_eq!(state.last_event_id, EventId::new(1, 1));
}

#[test]
#[should_panic]
fn insert_out_of_order_fails_fast() {
    let store = StateStore::new();
    let scope = hamlet();
    store.insert(&scope, Event::new((1, 3), "c"));
    store.insert(&scope, Event::new((1, 2), "b"));
}

#[test]
fn scopes_and_stats() {
    let store = StateStore::new();
    store.update_network(NetworkState::new("HamNet", "horatio"));
    store.append(&hamlet(), "x");
    store.append(&Scope::channel("OtherNet", "#elsinore"), "y");

    assert_eq!(
        store.scopes(),
        vec![
            Scope::network("HamNet"),
            hamlet(),
            Scope::channel("OtherNet", "#elsinore"),
        ]
    );
    assert_eq!(
        store.stats(),
        StoreStats {
            scopes: 2,
            events: 2,
            networks: 1,
            channels: 2,
            subscribed: false,
        }
    );
}

#[tokio::test]
async fn event_feed_sees_appends() {
    let store = StateStore::new();
    let mut feed = store.listen_events(CancellationToken::new());

    let event = store.append(&hamlet(), "hello");
    store.insert(&hamlet(), Event::new((5, 1), "explicit"));

    assert_eq!(feed.recv().await, Some((hamlet(), event)));
    assert_eq!(
        feed.recv().await.map(|(_, e)| e.id),
        Some(EventId::new(5, 1))
    );
}

#[tokio::test]
async fn event_feed_sees_backfill_oldest_first() {
    let store = StateStore::new();
    store.append(&hamlet(), "live");
    let mut feed = store.listen_events(CancellationToken::new());

    store.backfill(
        &hamlet(),
        vec![Event::new((-1, 2), "old 2"), Event::new((-1, 1), "old 1")],
    );

    assert_eq!(
        feed.recv().await.map(|(_, e)| e.id),
        Some(EventId::new(-1, 1))
    );
    assert_eq!(
        feed.recv().await.map(|(_, e)| e.id),
        Some(EventId::new(-1, 2))
    );
    assert_eq!(feed.try_recv(), None);
}

#[test]
fn mark_read_until_keeps_later_events_unread() {
    let store = StateStore::new();
    let scope = hamlet();
    let read = (0..3).map(|i| store.append(&scope, format!("read {}", i))).last();
    store.append(&scope, "arrived during render");
    store.append(&scope, "also new");

    store.mark_read_until(&scope, read.unwrap().id);
    assert_eq!(store.channel_state(&scope).unwrap().unread_count, 2);

    // Never raises the count back up
    store.mark_read(&scope);
    store.mark_read_until(&scope, EventId::new(1, 1));
    assert_eq!(store.channel_state(&scope).unwrap().unread_count, 0);
}

#[test]
fn channel_update_without_name_is_ignored() {
    let store = StateStore::new();
    store.update_channel(ChannelState::new("HamNet", ""));

    assert_eq!(store.channel_state(&Scope::network("HamNet")), None);
    assert_eq!(store.stats().channels, 0);
}
