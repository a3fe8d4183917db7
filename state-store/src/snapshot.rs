//! Snapshot trait for values held by a StateStore
//!
//! A snapshot is an immutable, fully populated value. The store never
//! patches a snapshot in place: writers hand it a complete new value and
//! the store asks the value which of its fields differ from the previous
//! one.
//!
//! # Example
//!
//! ```rust
//! use state_store::Snapshot;
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Reading {
//!     celsius: i32,
//!     battery: u8,
//! }
//!
//! impl Snapshot for Reading {
//!     fn diff(&self, previous: &Self) -> Vec<&'static str> {
//!         let mut fields = Vec::new();
//!         if self.celsius != previous.celsius {
//!             fields.push("celsius");
//!         }
//!         if self.battery != previous.battery {
//!             fields.push("battery");
//!         }
//!         fields
//!     }
//! }
//! ```

/// Values that can be stored, diffed and watched
///
/// Snapshots must be:
/// - Clone: subscribers receive their own handle to the value
/// - Send + Sync: values cross task boundaries
/// - 'static: values are held in long-lived channels
pub trait Snapshot: Clone + Send + Sync + 'static {
    /// Names of the fields that differ between `self` and `previous`
    ///
    /// An empty vector means the two values are observably identical and
    /// no notification is emitted.
    fn diff(&self, previous: &Self) -> Vec<&'static str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    struct Pair(i32, i32);

    impl Snapshot for Pair {
        fn diff(&self, previous: &Self) -> Vec<&'static str> {
            let mut fields = Vec::new();
            if self.0 != previous.0 {
                fields.push("left");
            }
            if self.1 != previous.1 {
                fields.push("right");
            }
            fields
        }
    }

    #[test]
    fn test_diff_reports_changed_fields() {
        assert_eq!(Pair(1, 2).diff(&Pair(1, 2)), Vec::<&str>::new());
        assert_eq!(Pair(1, 3).diff(&Pair(1, 2)), vec!["right"]);
        assert_eq!(Pair(0, 0).diff(&Pair(1, 2)), vec!["left", "right"]);
    }
}
