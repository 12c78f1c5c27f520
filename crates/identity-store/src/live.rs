//! Live subscriptions for store queries.
//!
//! A subscription delivers whole [`Snapshot`]s of a query result.
//!
//! # Design Principles
//!
//! - Subscribers are notified after the write is applied
//! - Every delivery is a full snapshot, so a late or repeated one is harmless
//! - Closing or dropping a subscription stops delivery; the hub prunes it on
//!   the next notify

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::types::Snapshot;

/// A subscription to a live query.
#[derive(Debug)]
pub struct LiveSubscription<T> {
    receiver: Option<UnboundedReceiver<Snapshot<T>>>,
    key: String,
}

impl<T> LiveSubscription<T> {
    /// Wraps the receiving end of a snapshot channel.
    ///
    /// Store implementations that produce snapshots from their own task
    /// (polling, websockets) hand the sender to that task and return this.
    pub fn new(key: impl Into<String>, receiver: UnboundedReceiver<Snapshot<T>>) -> Self {
        Self {
            receiver: Some(receiver),
            key: key.into(),
        }
    }

    /// Creates a connected sender and subscription.
    pub fn channel(key: impl Into<String>) -> (UnboundedSender<Snapshot<T>>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self::new(key, receiver))
    }

    /// The query this subscription follows (a rendered document path).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the subscription is closed or the store ended
    /// the stream.
    pub async fn next(&mut self) -> Option<Snapshot<T>> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    /// Returns a snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<Snapshot<T>> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// Stops delivery. Idempotent.
    pub fn close(&mut self) {
        if self.receiver.take().is_some() {
            tracing::debug!(key = %self.key, "live subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }
}

/// Fans snapshots out to every subscriber of a query key.
#[derive(Debug)]
pub struct LiveHub<T> {
    /// Map of query key to list of subscribers
    subscribers: RwLock<HashMap<String, Vec<UnboundedSender<Snapshot<T>>>>>,
    /// Last snapshot sent per key, kept for redelivery
    latest: RwLock<HashMap<String, Snapshot<T>>>,
}

impl<T: Clone> LiveHub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            latest: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a subscriber for `key`.
    ///
    /// When `initial` is given it is queued for this subscriber alone before
    /// any later notification.
    pub fn subscribe(&self, key: &str, initial: Option<Snapshot<T>>) -> LiveSubscription<T> {
        let (sender, subscription) = LiveSubscription::channel(key);
        if let Some(snapshot) = initial {
            // The receiver is alive in `subscription`, so this cannot fail.
            let _ = sender.send(snapshot);
        }

        let mut subscribers = self.subscribers.write().expect("lock poisoned");
        subscribers.entry(key.to_string()).or_default().push(sender);

        subscription
    }

    /// Broadcasts a snapshot to all subscribers of `key`.
    ///
    /// Dead subscribers are removed during this operation.
    pub fn notify(&self, key: &str, snapshot: Snapshot<T>) {
        {
            let mut subscribers = self.subscribers.write().expect("lock poisoned");
            if let Some(senders) = subscribers.get_mut(key) {
                senders.retain(|sender| sender.send(snapshot.clone()).is_ok());
                if senders.is_empty() {
                    subscribers.remove(key);
                }
            }
        }

        let mut latest = self.latest.write().expect("lock poisoned");
        latest.insert(key.to_string(), snapshot);
    }

    /// Sends the last snapshot for `key` again. Returns false if none was sent yet.
    pub fn redeliver(&self, key: &str) -> bool {
        let snapshot = {
            let latest = self.latest.read().expect("lock poisoned");
            match latest.get(key) {
                Some(snapshot) => snapshot.clone(),
                None => return false,
            }
        };
        self.notify(key, snapshot);
        true
    }

    /// Count of registered subscribers for `key`.
    ///
    /// May include dropped subscribers that no notify has pruned yet.
    pub fn subscriber_count(&self, key: &str) -> usize {
        let subscribers = self.subscribers.read().expect("lock poisoned");
        subscribers.get(key).map(|s| s.len()).unwrap_or(0)
    }
}

impl<T: Clone> Default for LiveHub<T> {
    fn default() -> Self {
        Self::new()
    }
}
