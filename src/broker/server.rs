//! Broker server and event loop
//!
//! A single task multiplexes TCP accepts, UDP datagram reads and
//! per-connection events, and exclusively owns the registry, every topic
//! journal and every connection write half. Handlers run to completion
//! between waits; the only suspension points are the `select!` itself and
//! bounded frame writes.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::registry::Registry;
use crate::session::{run_reader, ConnEvent, Connection};
use crate::stats::BrokerStats;
use crate::wire::{Datagram, Frame, DATAGRAM_MAX, DATA_MAX};

use super::config::BrokerConfig;
use super::router;

/// The broker: listeners plus all mutable state, driven by one task
pub struct BrokerServer {
    config: BrokerConfig,
    listener: TcpListener,
    udp: UdpSocket,
    registry: Registry,
    connections: HashMap<u64, Connection>,
    next_conn_id: u64,
    stats: BrokerStats,
    event_tx: mpsc::Sender<ConnEvent>,
    event_rx: mpsc::Receiver<ConnEvent>,
}

enum Wake {
    Accepted(TcpStream, SocketAddr),
    Datagram(usize, SocketAddr),
    Event(ConnEvent),
}

impl BrokerServer {
    /// Bind the TCP listener and the UDP socket on the configured port
    ///
    /// Both transports share one port. Bind failures are fatal; the caller
    /// reports them and exits non-zero.
    pub async fn bind(config: BrokerConfig) -> Result<Self> {
        let addr = SocketAddr::new(config.bind_ip, config.port);

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuseport(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(1024)?;

        // With port 0 the listener picks the port; the datagram socket
        // follows it so publishers and subscribers share one number.
        let tcp_addr = listener.local_addr()?;
        let udp = UdpSocket::bind(SocketAddr::new(config.bind_ip, tcp_addr.port())).await?;

        let registry = Registry::new(&config.data_dir, config.window_capacity)?;
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        tracing::info!(addr = %tcp_addr, data_dir = %config.data_dir.display(), "broker listening");

        Ok(Self {
            config,
            listener,
            udp,
            registry,
            connections: HashMap::new(),
            next_conn_id: 0,
            stats: BrokerStats::new(),
            event_tx,
            event_rx,
        })
    }

    /// Address of the TCP listener (the UDP socket shares its port)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }

    /// Run until a listener error occurs
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until `shutdown` resolves, then close every connection and
    /// flush every journal
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let result = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                Ok(())
            }
            result = self.serve() => result,
        };
        self.shutdown_all().await;
        result
    }

    async fn serve(&mut self) -> Result<()> {
        let mut udp_buf = vec![0u8; DATAGRAM_MAX + 64];
        loop {
            let wake = tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    Wake::Accepted(stream, peer)
                }
                received = self.udp.recv_from(&mut udp_buf) => {
                    let (len, source) = received?;
                    Wake::Datagram(len, source)
                }
                event = self.event_rx.recv() => match event {
                    Some(event) => Wake::Event(event),
                    None => continue,
                },
            };

            match wake {
                Wake::Accepted(stream, peer) => self.handle_accept(stream, peer),
                Wake::Datagram(len, source) => {
                    self.handle_datagram(&udp_buf[..len], source).await;
                }
                Wake::Event(event) => self.handle_event(event).await,
            }
        }
    }

    /// Register a fresh connection as reserved and spawn its reader
    fn handle_accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.config.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::warn!(peer = %peer, error = %e, "could not set TCP_NODELAY");
            }
        }

        let conn = self.next_conn_id;
        self.next_conn_id += 1;

        let (read_half, write_half) = stream.into_split();
        self.connections
            .insert(conn, Connection::new(conn, peer, write_half));
        tokio::spawn(run_reader(conn, read_half, self.event_tx.clone()));

        self.stats.connections_accepted += 1;
        tracing::debug!(conn, peer = %peer, "connection accepted");
    }

    /// Decode, journal and fan out one datagram
    async fn handle_datagram(&mut self, buf: &[u8], source: SocketAddr) {
        self.stats.datagrams_received += 1;

        let dgram = match Datagram::decode(buf) {
            Ok(dgram) => dgram,
            Err(e) => {
                self.stats.datagrams_dropped += 1;
                tracing::debug!(source = %source, error = %e, "datagram dropped");
                return;
            }
        };

        let rendered = dgram.render(source);
        if rendered.len() > DATA_MAX {
            self.stats.datagrams_dropped += 1;
            tracing::debug!(source = %source, "rendered publication too large, dropped");
            return;
        }

        let topic_id = self.registry.add_topic(&dgram.topic);
        let Some(topic) = self.registry.topic_mut(topic_id) else {
            return;
        };
        let sequence = topic.publish(&rendered);
        self.stats.publications += 1;
        tracing::trace!(topic = %dgram.topic, sequence, "publication journaled");

        let plan = router::fanout(&mut self.registry, topic_id, sequence);
        for delivery in plan {
            let frame = Frame::Data {
                text: rendered.clone(),
            };
            match self.send_to(delivery.conn, &frame).await {
                Ok(()) => self.stats.live_deliveries += 1,
                Err(e) => {
                    tracing::warn!(conn = delivery.conn, error = %e, "live delivery failed");
                    self.drop_connection(delivery.conn).await;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Frame { conn, frame } => self.handle_frame(conn, frame).await,
            ConnEvent::Closed { conn } => self.drop_connection(conn).await,
        }
    }

    async fn handle_frame(&mut self, conn: u64, frame: Frame) {
        match frame {
            Frame::Connect { identity } => self.handle_connect(conn, identity).await,
            Frame::Subscribe { topic, sf } => self.handle_subscribe(conn, topic, sf).await,
            Frame::Unsubscribe { topic_id } => self.handle_unsubscribe(conn, topic_id).await,
            other => {
                tracing::warn!(conn, frame = ?other, "unexpected frame from subscriber");
                self.drop_connection(conn).await;
            }
        }
    }

    /// CONNECT: bind the reserved connection to a subscriber identity
    async fn handle_connect(&mut self, conn: u64, identity: String) {
        let already_online = self
            .registry
            .subscriber(&identity)
            .map(|s| s.is_online())
            .unwrap_or(false);
        if already_online {
            // The incumbent session stays untouched; the newcomer gets a
            // single CONNECT_DUP and its connection is closed.
            self.stats.duplicates_rejected += 1;
            tracing::warn!(conn, identity = %identity, "duplicate identity rejected");
            let _ = self.send_to(conn, &Frame::ConnectDup).await;
            self.close_connection(conn).await;
            return;
        }

        let Some(connection) = self.connections.get_mut(&conn) else {
            return;
        };
        let Some(addr) = connection.go_online(&identity) else {
            tracing::warn!(conn, "CONNECT on an already-bound connection");
            self.drop_connection(conn).await;
            return;
        };

        let reconnect = self.registry.subscriber_exists(&identity);
        if !reconnect {
            self.registry.add_subscriber(&identity);
        }
        if let Err(e) = self.registry.bind_subscriber(&identity, conn, addr) {
            tracing::warn!(conn, error = %e, "could not bind subscriber");
            self.drop_connection(conn).await;
            return;
        }

        tracing::info!(identity = %identity, conn, peer = %addr, "subscriber online");
        if reconnect {
            self.catch_up(conn, &identity).await;
        }
    }

    /// Replay state to a returning subscriber
    ///
    /// TOPIC_ID frames first so the client can resolve ids, then the
    /// store-and-forward backlog per topic, strictly ascending. Runs to
    /// completion before any live delivery can reach this subscriber.
    async fn catch_up(&mut self, conn: u64, identity: &str) {
        let Some(subscriber) = self.registry.subscriber(identity) else {
            return;
        };
        let topics = subscriber.subscribed_topics();

        for &topic_id in &topics {
            let Some(name) = self.registry.topic_name(topic_id) else {
                continue;
            };
            let frame = Frame::TopicId {
                topic: name.to_owned(),
                topic_id,
            };
            if let Err(e) = self.send_to(conn, &frame).await {
                tracing::warn!(conn, error = %e, "catch-up failed");
                self.drop_connection(conn).await;
                return;
            }
        }

        for topic_id in topics {
            let Some(subscription) = self
                .registry
                .subscriber(identity)
                .and_then(|s| s.subscription(topic_id).copied())
            else {
                continue;
            };
            if !subscription.sf {
                continue;
            }

            let cursor = subscription.last_delivered;
            let backlog = match self.registry.topic(topic_id) {
                Some(topic) if cursor < topic.last_sequence() => {
                    topic.journal.range(cursor + 1, topic.last_sequence())
                }
                _ => continue,
            };

            let replayed = backlog.len() as i64;
            for text in backlog {
                if let Err(e) = self.send_to(conn, &Frame::Data { text }).await {
                    tracing::warn!(conn, error = %e, "catch-up failed");
                    self.drop_connection(conn).await;
                    return;
                }
                self.stats.replayed_deliveries += 1;
                // Brief pause so catch-up frames don't coalesce at the
                // receiver with Nagle disabled.
                tokio::time::sleep(self.config.catchup_pause).await;
            }

            if let Some(subscriber) = self.registry.subscriber_mut(identity) {
                subscriber.mark_delivered(topic_id, cursor + replayed);
            }
            tracing::debug!(identity = %identity, topic_id, replayed, "catch-up complete");
        }
    }

    /// SUBSCRIBE: register interest, creating the topic on first sight
    async fn handle_subscribe(&mut self, conn: u64, topic: String, sf: bool) {
        let Some(identity) = self.registry.identity_by_conn(conn).map(|s| s.to_owned()) else {
            tracing::warn!(conn, "SUBSCRIBE before CONNECT");
            self.drop_connection(conn).await;
            return;
        };

        let topic_id = self.registry.add_topic(&topic);
        let last_sequence = self
            .registry
            .topic(topic_id)
            .map(|t| t.last_sequence())
            .unwrap_or(-1);
        if let Some(subscriber) = self.registry.subscriber_mut(&identity) {
            subscriber.subscribe(topic_id, sf, last_sequence);
        }
        tracing::info!(identity = %identity, topic = %topic, topic_id, sf, "subscribed");

        let reply = Frame::TopicId { topic, topic_id };
        if let Err(e) = self.send_to(conn, &reply).await {
            tracing::warn!(conn, error = %e, "reply failed");
            self.drop_connection(conn).await;
        }
    }

    /// UNSUBSCRIBE: drop interest, confirm unconditionally
    async fn handle_unsubscribe(&mut self, conn: u64, topic_id: u32) {
        let Some(identity) = self.registry.identity_by_conn(conn).map(|s| s.to_owned()) else {
            tracing::warn!(conn, "UNSUBSCRIBE before CONNECT");
            self.drop_connection(conn).await;
            return;
        };

        if let Some(subscriber) = self.registry.subscriber_mut(&identity) {
            subscriber.unsubscribe(topic_id);
        }
        tracing::info!(identity = %identity, topic_id, "unsubscribed");

        if let Err(e) = self.send_to(conn, &Frame::ConfirmUnsubscribe { topic_id }).await {
            tracing::warn!(conn, error = %e, "reply failed");
            self.drop_connection(conn).await;
        }
    }

    async fn send_to(&mut self, conn: u64, frame: &Frame) -> io::Result<()> {
        match self.connections.get_mut(&conn) {
            Some(connection) => connection.send(frame).await,
            None => Ok(()),
        }
    }

    /// Close the socket without touching registry state
    async fn close_connection(&mut self, conn: u64) {
        if let Some(mut connection) = self.connections.remove(&conn) {
            connection.shutdown().await;
        }
    }

    /// Close the socket and mark any bound subscriber offline
    async fn drop_connection(&mut self, conn: u64) {
        self.close_connection(conn).await;
        if let Some(identity) = self.registry.disconnect_by_conn(conn) {
            self.stats.disconnects += 1;
            tracing::info!(identity = %identity, conn, "subscriber offline");
        }
    }

    async fn shutdown_all(&mut self) {
        let conns: Vec<u64> = self.connections.keys().copied().collect();
        for conn in conns {
            self.drop_connection(conn).await;
        }
        self.registry.flush_all();
        self.stats.log_summary();
        tracing::info!("broker stopped");
    }
}
