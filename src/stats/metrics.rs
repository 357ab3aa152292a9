//! Statistics for a running broker
//!
//! Plain counters owned by the broker task; there is exactly one mutator,
//! so no atomics are needed.

/// Broker-wide statistics
#[derive(Debug, Clone, Default)]
pub struct BrokerStats {
    /// Datagrams read off the UDP socket
    pub datagrams_received: u64,
    /// Datagrams dropped for malformed payloads or unknown tags
    pub datagrams_dropped: u64,
    /// Publications appended to a journal
    pub publications: u64,
    /// DATA frames sent to online subscribers at publish time
    pub live_deliveries: u64,
    /// DATA frames replayed during reconnect catch-up
    pub replayed_deliveries: u64,
    /// TCP connections accepted
    pub connections_accepted: u64,
    /// CONNECTs rejected because the identity was already online
    pub duplicates_rejected: u64,
    /// Subscriber sessions that ended (EOF or error)
    pub disconnects: u64,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a one-line summary at info level
    pub fn log_summary(&self) {
        tracing::info!(
            datagrams = self.datagrams_received,
            dropped = self.datagrams_dropped,
            publications = self.publications,
            live = self.live_deliveries,
            replayed = self.replayed_deliveries,
            connections = self.connections_accepted,
            duplicates = self.duplicates_rejected,
            disconnects = self.disconnects,
            "broker statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = BrokerStats::new();
        assert_eq!(stats.datagrams_received, 0);
        assert_eq!(stats.datagrams_dropped, 0);
        assert_eq!(stats.publications, 0);
        assert_eq!(stats.live_deliveries, 0);
        assert_eq!(stats.replayed_deliveries, 0);
        assert_eq!(stats.connections_accepted, 0);
        assert_eq!(stats.duplicates_rejected, 0);
        assert_eq!(stats.disconnects, 0);
    }
}
