//! Broker server: event loop, routing and configuration
//!
//! [`BrokerServer`] is the serial point of the whole system. One task owns
//! the registry, every journal and every connection write half, and
//! multiplexes TCP accepts, UDP datagrams and per-connection events in a
//! single `select!` loop. The [`router`] is a pure function over the
//! registry that turns a fresh publication into a delivery plan.

pub mod config;
pub mod router;
pub mod server;

pub use config::BrokerConfig;
pub use server::BrokerServer;
