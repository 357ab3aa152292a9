//! Subscriber client
//!
//! High-level API used by the `subscriber` binary: connect with a durable
//! identity, issue subscribe/unsubscribe commands by topic name, and
//! consume broker frames as [`ClientEvent`]s.

pub mod subscriber;

pub use subscriber::{ClientEvent, SubscriberClient};

/// Maximum identity length accepted on the command line
pub const IDENTITY_MAX: usize = 10;
