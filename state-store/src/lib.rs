//! Generic Snapshot Store
//!
//! A keyed store of immutable snapshots with atomic replacement,
//! field-level change detection and async subscriptions.
//!
//! # Features
//!
//! - **Atomic Replacement**: Readers see the old snapshot or the new one, never a mix
//! - **Change Detection**: Only emit events when at least one field differs
//! - **Per-Entity Subscriptions**: Follow one entity, with coalescing of missed updates
//! - **Change Feed**: Observe every committed change across all entities
//! - **Generic Entity IDs**: Use any hashable type as entity identifiers
//!
//! # Quick Start
//!
//! ```rust
//! use state_store::{Snapshot, StateStore};
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Reading {
//!     celsius: i32,
//! }
//!
//! impl Snapshot for Reading {
//!     fn diff(&self, previous: &Self) -> Vec<&'static str> {
//!         if self.celsius != previous.celsius {
//!             vec!["celsius"]
//!         } else {
//!             Vec::new()
//!         }
//!     }
//! }
//!
//! let store = StateStore::<String, Reading>::new();
//! store.insert("sensor-1".to_string(), Reading { celsius: 20 });
//!
//! let event = store.replace(&"sensor-1".to_string(), Reading { celsius: 22 });
//! assert_eq!(event.map(|e| e.changed_fields), Some(vec!["celsius"]));
//!
//! let current = store.get(&"sensor-1".to_string());
//! assert_eq!(current.map(|r| r.celsius), Some(22));
//! ```
//!
//! # Consumption Patterns
//!
//! ```rust,ignore
//! // One entity, latest value wins
//! let mut sub = store.subscribe(&id).unwrap();
//! while let Some(update) = sub.next().await {
//!     println!("v{} changed {:?}", update.version, update.changed_fields);
//! }
//!
//! // Every entity, every committed change
//! let mut feed = store.changes();
//! while let Some(event) = feed.recv().await {
//!     println!("{:?} changed {:?}", event.entity_id, event.changed_fields);
//! }
//! ```

mod event;
mod feed;
mod snapshot;
mod store;
mod subscription;

pub use event::ChangeEvent;
pub use feed::ChangeFeed;
pub use snapshot::Snapshot;
pub use store::{StateStore, Versioned, DEFAULT_FEED_CAPACITY};
pub use subscription::{Subscription, Update};
