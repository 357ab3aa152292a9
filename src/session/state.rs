//! Connection state machine
//!
//! A connection starts **reserved**: accepted, peer address recorded,
//! identity unknown. The first CONNECT frame consumes the reserved address
//! and either binds the connection to a subscriber identity (**online**) or
//! gets it rejected as a duplicate. There is no separate pending-address
//! table; the address travels inside the state.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;

use crate::wire::frame::write_frame;
use crate::wire::Frame;

/// Lifecycle state of one TCP connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted; waiting for CONNECT to learn the identity
    Reserved { addr: SocketAddr },
    /// Bound to a subscriber identity
    Online { identity: String },
}

impl ConnectionState {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ConnectionState::Reserved { .. })
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            ConnectionState::Online { identity } => Some(identity),
            ConnectionState::Reserved { .. } => None,
        }
    }
}

/// Broker-side handle for one live connection: write half + state
#[derive(Debug)]
pub struct Connection {
    id: u64,
    addr: SocketAddr,
    state: ConnectionState,
    writer: OwnedWriteHalf,
}

impl Connection {
    /// Wrap a freshly accepted connection in the reserved state
    pub fn new(id: u64, addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            id,
            addr,
            state: ConnectionState::Reserved { addr },
            writer,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&str> {
        self.state.identity()
    }

    /// Consume the reserved address and bind the connection to an identity
    ///
    /// Returns the address recorded at accept time, or `None` if the
    /// connection was already online (a protocol violation by the peer).
    pub fn go_online(&mut self, identity: &str) -> Option<SocketAddr> {
        match self.state {
            ConnectionState::Reserved { addr } => {
                self.state = ConnectionState::Online {
                    identity: identity.to_owned(),
                };
                Some(addr)
            }
            ConnectionState::Online { .. } => None,
        }
    }

    /// Send one frame to the subscriber
    pub async fn send(&mut self, frame: &Frame) -> io::Result<()> {
        write_frame(&mut self.writer, frame).await
    }

    /// Graceful half-close of the write side
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}
