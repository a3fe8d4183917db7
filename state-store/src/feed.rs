//! Store-wide change feed

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use crate::event::ChangeEvent;

/// Receiver for change events of every entity in a store
///
/// A receiver that falls behind the feed capacity skips the oldest events
/// and logs how many were lost.
pub struct ChangeFeed<Id> {
    rx: broadcast::Receiver<ChangeEvent<Id>>,
}

impl<Id: Clone> ChangeFeed<Id> {
    pub(crate) fn new(rx: broadcast::Receiver<ChangeEvent<Id>>) -> Self {
        Self { rx }
    }

    /// Wait for the next change event
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent<Id>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change feed receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next change event without waiting
    pub fn try_recv(&mut self) -> Option<ChangeEvent<Id>> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change feed receiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait up to `timeout` for the next change event
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<ChangeEvent<Id>> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }
}
