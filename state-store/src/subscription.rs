//! Per-entity subscriptions
//!
//! A `Subscription` follows a single entity's snapshot. Replacements that
//! happen while the subscriber is not polling are coalesced: `next()`
//! yields the latest committed snapshot with the fields that differ from
//! the last one this subscriber saw.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::watch;

use crate::snapshot::Snapshot;
use crate::store::Versioned;

/// A snapshot delivered to a subscriber
#[derive(Debug, Clone)]
pub struct Update<S> {
    /// The committed snapshot
    pub value: Arc<S>,

    /// Version of the committed snapshot
    pub version: u64,

    /// Fields that differ from the previous snapshot this subscriber saw
    pub changed_fields: Vec<&'static str>,
}

/// Subscription to one entity's snapshot replacements
pub struct Subscription<S> {
    rx: watch::Receiver<Versioned<S>>,
    last: Versioned<S>,
}

impl<S: Snapshot> Subscription<S> {
    pub(crate) fn new(mut rx: watch::Receiver<Versioned<S>>) -> Self {
        let last = rx.borrow_and_update().clone();
        Self { rx, last }
    }

    /// Latest committed snapshot
    pub fn current(&self) -> Arc<S> {
        Arc::clone(&self.rx.borrow().value)
    }

    /// Version of the last snapshot delivered to this subscriber
    pub fn last_seen_version(&self) -> u64 {
        self.last.version
    }

    /// Wait for the next snapshot that differs from the last one seen
    ///
    /// Returns `None` once the entity has been removed from the store or
    /// the store has been dropped.
    pub async fn next(&mut self) -> Option<Update<S>> {
        loop {
            self.rx.changed().await.ok()?;
            let latest = self.rx.borrow_and_update().clone();
            let changed_fields = latest.value.diff(&self.last.value);
            self.last = latest;

            // A -> B -> A between polls collapses to nothing
            if changed_fields.is_empty() {
                continue;
            }

            return Some(Update {
                value: Arc::clone(&self.last.value),
                version: self.last.version,
                changed_fields,
            });
        }
    }

    /// Like [`next`](Self::next) but gives up after `timeout`
    ///
    /// Returns `None` on timeout as well as on closure.
    pub async fn next_timeout(&mut self, timeout: Duration) -> Option<Update<S>> {
        tokio::time::timeout(timeout, self.next())
            .await
            .ok()
            .flatten()
    }

    /// Convert into a stream of updates
    pub fn into_stream(self) -> impl Stream<Item = Update<S>> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|update| (update, sub))
        })
    }
}
