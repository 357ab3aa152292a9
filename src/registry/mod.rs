//! Topic and subscriber registry
//!
//! The registry is the broker's single source of truth: topics (name ↔ id,
//! each owning its journal), subscribers keyed by durable identity, and the
//! per-(subscriber, topic) store-and-forward state.
//!
//! # Architecture
//!
//! ```text
//!                    Registry
//!     ┌──────────────────────────────────────┐
//!     │ topics: id → Topic { journal }       │
//!     │ ids_by_name: name → id   (bijection) │
//!     │ subscribers: identity → Subscriber { │
//!     │   conn?, addr?,                      │
//!     │   subscriptions: topic → {sf,cursor} │
//!     │ }                                    │
//!     │ identities_by_conn: conn → identity  │
//!     └──────────────────────────────────────┘
//! ```
//!
//! Identities are durable; connections are transient indexes that are
//! rebound on reconnect. The registry is owned exclusively by the broker
//! task, so no interior locking is needed.

pub mod error;
pub mod store;
pub mod subscriber;
pub mod topic;

pub use error::RegistryError;
pub use store::Registry;
pub use subscriber::{Subscriber, Subscription};
pub use topic::Topic;
