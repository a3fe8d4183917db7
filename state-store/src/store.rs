//! StateStore - keyed snapshots with atomic replace and change notification
//!
//! Each entity owns one `watch` channel holding its current snapshot. A
//! replacement swaps the whole value in a single send, so readers observe
//! either the previous snapshot or the new one and never a mix. The
//! store-wide `broadcast` feed announces committed changes after the swap.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::event::ChangeEvent;
use crate::feed::ChangeFeed;
use crate::snapshot::Snapshot;
use crate::subscription::Subscription;

/// Default capacity of the store-wide change feed
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// A committed snapshot together with its version
///
/// Versions start at 0 when an entity is inserted and increase by one for
/// every replacement that changes at least one field.
#[derive(Debug)]
pub struct Versioned<S> {
    pub value: Arc<S>,
    pub version: u64,
}

impl<S> Clone for Versioned<S> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            version: self.version,
        }
    }
}

/// Keyed store of immutable snapshots
///
/// Cloning a `StateStore` yields another handle to the same entries.
///
/// # Example
///
/// ```rust,ignore
/// let store: StateStore<String, Reading> = StateStore::new();
/// store.insert("sensor-1".to_string(), Reading { celsius: 20, battery: 90 });
///
/// let mut sub = store.subscribe(&"sensor-1".to_string()).unwrap();
/// store.replace(&"sensor-1".to_string(), Reading { celsius: 21, battery: 90 });
///
/// let update = sub.next().await.unwrap();
/// assert_eq!(update.changed_fields, vec!["celsius"]);
/// ```
pub struct StateStore<Id, S> {
    entries: Arc<RwLock<HashMap<Id, watch::Sender<Versioned<S>>>>>,
    changes_tx: broadcast::Sender<ChangeEvent<Id>>,
}

impl<Id, S> Clone for StateStore<Id, S> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            changes_tx: self.changes_tx.clone(),
        }
    }
}

impl<Id, S> Default for StateStore<Id, S>
where
    Id: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    S: Snapshot,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, S> StateStore<Id, S>
where
    Id: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    S: Snapshot,
{
    /// Create an empty store with the default feed capacity
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Create an empty store whose change feed buffers `capacity` events
    ///
    /// Feed receivers that fall further behind skip the oldest events.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (changes_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            changes_tx,
        }
    }

    /// Register an entity with its initial snapshot
    ///
    /// If the entity already exists this behaves like [`replace`](Self::replace).
    pub fn insert(&self, id: Id, value: S) -> Option<ChangeEvent<Id>> {
        {
            let mut entries = self.entries.write();
            if !entries.contains_key(&id) {
                let (tx, _) = watch::channel(Versioned {
                    value: Arc::new(value),
                    version: 0,
                });
                trace!(entity = ?id, "Inserted entity");
                entries.insert(id, tx);
                return None;
            }
        }
        self.replace(&id, value)
    }

    /// Atomically replace an entity's snapshot
    ///
    /// Returns the emitted change event, or `None` when the entity is
    /// unknown or the new value has no field-level differences.
    pub fn replace(&self, id: &Id, value: S) -> Option<ChangeEvent<Id>> {
        self.update(id, move |_| value)
    }

    /// Derive a new snapshot from the current one and commit it atomically
    ///
    /// The closure runs while the entity's channel is locked for writing;
    /// it must not call back into the store for the same entity.
    pub fn update<F>(&self, id: &Id, f: F) -> Option<ChangeEvent<Id>>
    where
        F: FnOnce(&S) -> S,
    {
        let entries = self.entries.read();
        let tx = entries.get(id)?;

        let mut committed: Option<(Vec<&'static str>, u64)> = None;
        tx.send_if_modified(|current| {
            let next = f(&current.value);
            let changed = next.diff(&current.value);
            if changed.is_empty() {
                return false;
            }
            current.value = Arc::new(next);
            current.version += 1;
            committed = Some((changed, current.version));
            true
        });
        drop(entries);

        let (changed_fields, version) = committed?;
        trace!(entity = ?id, ?changed_fields, version, "Committed snapshot");

        let event = ChangeEvent::new(id.clone(), changed_fields, version);
        // No feed receivers is not an error
        let _ = self.changes_tx.send(event.clone());
        Some(event)
    }

    /// Current snapshot of an entity
    pub fn get(&self, id: &Id) -> Option<Arc<S>> {
        self.entries
            .read()
            .get(id)
            .map(|tx| Arc::clone(&tx.borrow().value))
    }

    /// Current snapshot of an entity together with its version
    pub fn get_versioned(&self, id: &Id) -> Option<Versioned<S>> {
        self.entries.read().get(id).map(|tx| tx.borrow().clone())
    }

    /// Subscribe to snapshot replacements of one entity
    pub fn subscribe(&self, id: &Id) -> Option<Subscription<S>> {
        self.entries
            .read()
            .get(id)
            .map(|tx| Subscription::new(tx.subscribe()))
    }

    /// Subscribe to the store-wide change feed
    pub fn changes(&self) -> ChangeFeed<Id> {
        ChangeFeed::new(self.changes_tx.subscribe())
    }

    /// Remove an entity, closing its subscriptions
    pub fn remove(&self, id: &Id) -> Option<Arc<S>> {
        let tx = self.entries.write().remove(id)?;
        let value = Arc::clone(&tx.borrow().value);
        trace!(entity = ?id, "Removed entity");
        Some(value)
    }

    /// Whether the store holds `id`
    pub fn contains(&self, id: &Id) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Identifiers of all stored entities
    pub fn ids(&self) -> Vec<Id> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Reading {
        celsius: i32,
        battery: u8,
    }

    impl Snapshot for Reading {
        fn diff(&self, previous: &Self) -> Vec<&'static str> {
            let mut fields = Vec::new();
            if self.celsius != previous.celsius {
                fields.push("celsius");
            }
            if self.battery != previous.battery {
                fields.push("battery");
            }
            fields
        }
    }

    fn reading(celsius: i32, battery: u8) -> Reading {
        Reading { celsius, battery }
    }

    fn id(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_insert_and_get() {
        let store: StateStore<String, Reading> = StateStore::new();
        assert!(store.is_empty());

        assert!(store.insert(id("a"), reading(20, 90)).is_none());

        assert_eq!(store.len(), 1);
        assert!(store.contains(&id("a")));
        assert_eq!(*store.get(&id("a")).unwrap(), reading(20, 90));
        assert_eq!(store.get_versioned(&id("a")).unwrap().version, 0);
        assert!(store.get(&id("b")).is_none());
    }

    #[test]
    fn test_replace_emits_changed_fields() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));
        let mut feed = store.changes();

        let event = store.replace(&id("a"), reading(21, 90)).unwrap();
        assert_eq!(event.changed_fields, vec!["celsius"]);
        assert_eq!(event.version, 1);

        let received = feed.try_recv().unwrap();
        assert_eq!(received, event);
        assert!(feed.try_recv().is_none());
    }

    #[test]
    fn test_identical_replace_is_silent() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));
        let mut feed = store.changes();

        assert!(store.replace(&id("a"), reading(20, 90)).is_none());
        assert!(feed.try_recv().is_none());
        assert_eq!(store.get_versioned(&id("a")).unwrap().version, 0);
    }

    #[test]
    fn test_replace_unknown_entity() {
        let store: StateStore<String, Reading> = StateStore::new();
        assert!(store.replace(&id("missing"), reading(1, 1)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_existing_acts_as_replace() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));

        let event = store.insert(id("a"), reading(20, 80)).unwrap();
        assert_eq!(event.changed_fields, vec!["battery"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_derives_from_current() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));

        store.update(&id("a"), |r| reading(r.celsius + 5, r.battery));
        assert_eq!(store.get(&id("a")).unwrap().celsius, 25);
    }

    #[test]
    fn test_remove() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));
        store.insert(id("b"), reading(10, 50));

        let removed = store.remove(&id("a")).unwrap();
        assert_eq!(*removed, reading(20, 90));
        assert!(!store.contains(&id("a")));
        assert_eq!(store.ids(), vec![id("b")]);
        assert!(store.remove(&id("a")).is_none());
    }

    #[test]
    fn test_clone_shares_entries() {
        let store: StateStore<String, Reading> = StateStore::new();
        let other = store.clone();
        store.insert(id("a"), reading(20, 90));

        assert!(other.contains(&id("a")));
    }

    #[tokio::test]
    async fn test_subscription_receives_replacement() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));
        let mut sub = store.subscribe(&id("a")).unwrap();

        store.replace(&id("a"), reading(20, 70));

        let update = sub.next().await.unwrap();
        assert_eq!(*update.value, reading(20, 70));
        assert_eq!(update.changed_fields, vec!["battery"]);
        assert_eq!(update.version, 1);
    }

    #[tokio::test]
    async fn test_subscription_ends_on_remove() {
        let store: StateStore<String, Reading> = StateStore::new();
        store.insert(id("a"), reading(20, 90));
        let mut sub = store.subscribe(&id("a")).unwrap();

        store.remove(&id("a"));

        assert!(sub.next().await.is_none());
    }
}
