//! Broker counters

mod metrics;

pub use metrics::BrokerStats;
