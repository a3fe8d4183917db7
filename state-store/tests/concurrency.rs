//! Concurrency and ordering tests for StateStore

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use proptest::prelude::*;
use state_store::{Snapshot, StateStore};

/// Two fields that every writer keeps equal; a torn read would break that
#[derive(Clone, Debug, PartialEq)]
struct Paired {
    left: u64,
    right: u64,
}

impl Snapshot for Paired {
    fn diff(&self, previous: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.left != previous.left {
            fields.push("left");
        }
        if self.right != previous.right {
            fields.push("right");
        }
        fields
    }
}

fn paired(n: u64) -> Paired {
    Paired { left: n, right: n }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_torn_snapshot() {
    let store: StateStore<u32, Paired> = StateStore::new();
    store.insert(1, paired(0));

    let writer_store = store.clone();
    let writer = tokio::spawn(async move {
        for n in 1..=2_000u64 {
            writer_store.replace(&1, paired(n));
            if n % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }
    });

    let mut readers = Vec::new();
    for _ in 0..3 {
        let reader_store = store.clone();
        readers.push(tokio::spawn(async move {
            let mut last_seen = 0;
            for _ in 0..2_000 {
                let snapshot = reader_store.get(&1).expect("entity present");
                assert_eq!(snapshot.left, snapshot.right);
                assert!(snapshot.left >= last_seen, "snapshots went backwards");
                last_seen = snapshot.left;
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(*store.get(&1).unwrap(), paired(2_000));
}

#[tokio::test]
async fn test_subscription_coalesces_missed_updates() {
    let store: StateStore<u32, Paired> = StateStore::new();
    store.insert(1, paired(0));
    let mut sub = store.subscribe(&1).unwrap();

    store.replace(&1, paired(1));
    store.replace(&1, paired(2));
    store.replace(&1, paired(3));

    let update = sub.next().await.unwrap();
    assert_eq!(*update.value, paired(3));
    assert_eq!(update.version, 3);

    assert!(sub.next_timeout(Duration::from_millis(20)).await.is_none());
}

#[tokio::test]
async fn test_subscription_skips_round_trip_back_to_seen_value() {
    let store: StateStore<u32, Paired> = StateStore::new();
    store.insert(1, paired(0));
    let mut sub = store.subscribe(&1).unwrap();

    store.replace(&1, paired(5));
    store.replace(&1, paired(0));

    assert!(sub.next_timeout(Duration::from_millis(20)).await.is_none());

    store.replace(&1, paired(7));
    let update = sub.next().await.unwrap();
    assert_eq!(update.changed_fields, vec!["left", "right"]);
}

#[tokio::test]
async fn test_change_feed_preserves_commit_order_per_entity() {
    let store: StateStore<u32, Paired> = StateStore::new();
    store.insert(1, paired(0));
    store.insert(2, paired(0));
    let mut feed = store.changes();

    store.replace(&1, paired(1));
    store.replace(&2, paired(1));
    store.replace(&1, paired(2));

    let versions: Vec<(u32, u64)> = [
        feed.recv().await.unwrap(),
        feed.recv().await.unwrap(),
        feed.recv().await.unwrap(),
    ]
    .iter()
    .map(|e| (e.entity_id, e.version))
    .collect();

    assert_eq!(versions, vec![(1, 1), (2, 1), (1, 2)]);
}

#[tokio::test]
async fn test_lagged_feed_skips_to_recent_events() {
    let store: StateStore<u32, Paired> = StateStore::with_feed_capacity(2);
    store.insert(1, paired(0));
    let mut feed = store.changes();

    for n in 1..=5 {
        store.replace(&1, paired(n));
    }

    let first = feed.recv().await.unwrap();
    assert_eq!(first.version, 4);
    assert_eq!(feed.recv().await.unwrap().version, 5);
    assert!(feed.try_recv().is_none());
}

#[tokio::test]
async fn test_subscription_stream() {
    let store: StateStore<u32, Paired> = StateStore::new();
    store.insert(1, paired(0));
    let stream = store.subscribe(&1).unwrap().into_stream();

    let writer = store.clone();
    tokio::spawn(async move {
        writer.replace(&1, paired(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        writer.remove(&1);
    });

    let updates: Vec<_> = stream.collect().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(*updates[0].value, paired(1));
}

#[test]
fn test_shared_arc_survives_replacement() {
    let store: StateStore<u32, Paired> = StateStore::new();
    store.insert(1, paired(0));
    let held: Arc<Paired> = store.get(&1).unwrap();

    store.replace(&1, paired(9));

    assert_eq!(*held, paired(0));
    assert_eq!(*store.get(&1).unwrap(), paired(9));
}

proptest! {
    #[test]
    fn prop_events_match_distinct_transitions(values in proptest::collection::vec(0u64..4, 1..40)) {
        let store: StateStore<u32, Paired> = StateStore::with_feed_capacity(64);
        store.insert(1, paired(0));
        let mut feed = store.changes();

        let mut previous = 0;
        let mut expected = 0u64;
        for value in &values {
            store.replace(&1, paired(*value));
            if *value != previous {
                expected += 1;
            }
            previous = *value;
        }

        let mut received = 0u64;
        while let Some(event) = feed.try_recv() {
            received += 1;
            prop_assert_eq!(event.version, received);
        }

        prop_assert_eq!(received, expected);
        prop_assert_eq!(store.get_versioned(&1).unwrap().version, expected);
        prop_assert_eq!(store.get(&1).unwrap().left, *values.last().unwrap());
    }
}
