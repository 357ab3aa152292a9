//! feedbus-rs: an asymmetric publish/subscribe broker
//!
//! Publishers post typed, topic-tagged datagrams over UDP; subscribers
//! connect over TCP, register interest in named topics, and receive the
//! human-readable rendering of each matching publication. A subscriber may
//! enable store-and-forward per topic, in which case publications arriving
//! while it is offline are journaled and replayed on reconnect in
//! publication order.
//!
//! # Architecture
//!
//! ```text
//!   UDP publishers                 TCP subscribers
//!        │                          ▲          ▲
//!        ▼                          │ DATA     │ DATA
//!  ┌───────────┐   append   ┌───────┴──────────┴───────┐
//!  │ WireCodec │──────────► │       BrokerServer       │
//!  │ (decode + │            │  Registry ── Router      │
//!  │  render)  │            │     │                    │
//!  └───────────┘            │  TopicJournal (RAM tail  │
//!                           │   + append-only file)    │
//!                           └──────────────────────────┘
//! ```
//!
//! One broker task owns all mutable state; per-connection reader tasks only
//! pump decoded frames into it over a channel.

pub mod broker;
pub mod client;
pub mod error;
pub mod fs;
pub mod journal;
pub mod registry;
pub mod session;
pub mod stats;
pub mod wire;

pub use broker::{BrokerConfig, BrokerServer};
pub use error::{Error, Result};
