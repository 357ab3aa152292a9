//! Broker configuration

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::journal::DEFAULT_WINDOW_CAPACITY;

/// Default port when none is given on the command line
pub const DEFAULT_PORT: u16 = 7654;

/// Broker configuration options
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address to bind both listeners to
    pub bind_ip: IpAddr,

    /// Port shared by the TCP listener and the UDP socket (0 = ephemeral)
    pub port: u16,

    /// Directory holding one journal file per topic
    pub data_dir: PathBuf,

    /// Bound on each topic's in-memory window, in entries
    pub window_capacity: usize,

    /// Pause between catch-up sends so frames don't coalesce at receivers
    pub catchup_pause: Duration,

    /// Capacity of the reader → broker event channel
    pub event_channel_capacity: usize,

    /// Enable TCP_NODELAY on subscriber connections
    pub tcp_nodelay: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("./data"),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            catchup_pause: Duration::from_micros(10),
            event_channel_capacity: 256,
            tcp_nodelay: true,
        }
    }
}

impl BrokerConfig {
    /// Create a config for the given port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the journal directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the per-topic window bound
    pub fn window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity.max(1);
        self
    }

    /// Set the pause between catch-up sends
    pub fn catchup_pause(mut self, pause: Duration) -> Self {
        self.catchup_pause = pause;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
