//! Change events for snapshot replacements
//!
//! Every committed replacement that changes at least one field produces a
//! `ChangeEvent` on the store-wide change feed.

use std::time::Instant;

/// A change event emitted when an entity's snapshot is replaced
///
/// Events carry the changed field names and the new version, not the
/// value itself. Use `StateStore::get()` to read the committed value, or
/// hold a per-entity `Subscription` to receive values directly.
///
/// # Example
///
/// ```rust,ignore
/// let mut feed = store.changes();
/// while let Some(event) = feed.recv().await {
///     println!("{:?} changed {:?}", event.entity_id, event.changed_fields);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent<Id> {
    /// The entity whose snapshot changed
    pub entity_id: Id,

    /// Field names that differ from the previous snapshot
    pub changed_fields: Vec<&'static str>,

    /// Version of the snapshot that was committed
    pub version: u64,

    /// When the change was committed
    pub timestamp: Instant,
}

impl<Id> ChangeEvent<Id> {
    /// Create a new change event
    pub fn new(entity_id: Id, changed_fields: Vec<&'static str>, version: u64) -> Self {
        Self {
            entity_id,
            changed_fields,
            version,
            timestamp: Instant::now(),
        }
    }

    /// Whether `field` is among the changed fields
    pub fn touches(&self, field: &str) -> bool {
        self.changed_fields.iter().any(|f| *f == field)
    }
}

impl<Id: PartialEq> PartialEq for ChangeEvent<Id> {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.entity_id == other.entity_id
            && self.changed_fields == other.changed_fields
            && self.version == other.version
    }
}
