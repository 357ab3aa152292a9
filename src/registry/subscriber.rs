//! Subscriber record and per-topic subscription state
//!
//! The durable key is the string identity: the connection, address and
//! online status are transient and replaced on every reconnect, while the
//! subscription map (store-and-forward flag + delivery cursor per topic)
//! survives disconnects.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Per-(subscriber, topic) state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// Replay publications missed while offline
    pub sf: bool,
    /// Sequence of the last publication delivered on this topic
    pub last_delivered: i64,
}

/// A subscriber, durable across reconnections
#[derive(Debug)]
pub struct Subscriber {
    identity: String,
    conn: Option<u64>,
    addr: Option<SocketAddr>,
    subscriptions: HashMap<u32, Subscription>,
}

impl Subscriber {
    /// Create a new, offline subscriber
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            conn: None,
            addr: None,
            subscriptions: HashMap::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn conn(&self) -> Option<u64> {
        self.conn
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn is_online(&self) -> bool {
        self.conn.is_some()
    }

    /// Attach a live connection, marking the subscriber online
    pub fn bind(&mut self, conn: u64, addr: SocketAddr) {
        self.conn = Some(conn);
        self.addr = Some(addr);
    }

    /// Detach the connection; subscriptions are retained
    pub fn disconnect(&mut self) {
        self.conn = None;
        self.addr = None;
    }

    /// Add a subscription with its starting cursor
    ///
    /// Re-subscribing to an already-subscribed topic leaves the existing
    /// flag and cursor untouched. Returns whether the subscription is new.
    pub fn subscribe(&mut self, topic_id: u32, sf: bool, last_delivered: i64) -> bool {
        if self.subscriptions.contains_key(&topic_id) {
            return false;
        }
        self.subscriptions
            .insert(topic_id, Subscription { sf, last_delivered });
        true
    }

    /// Drop a subscription; returns whether one existed
    pub fn unsubscribe(&mut self, topic_id: u32) -> bool {
        self.subscriptions.remove(&topic_id).is_some()
    }

    pub fn subscription(&self, topic_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&topic_id)
    }

    pub fn is_subscribed(&self, topic_id: u32) -> bool {
        self.subscriptions.contains_key(&topic_id)
    }

    /// Advance the delivery cursor for a topic
    pub fn mark_delivered(&mut self, topic_id: u32, sequence: i64) {
        if let Some(sub) = self.subscriptions.get_mut(&topic_id) {
            sub.last_delivered = sequence;
        }
    }

    /// Subscribed topic ids in ascending order
    pub fn subscribed_topics(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.subscriptions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
