//! Per-connection session handling
//!
//! Each accepted TCP connection is split in two: the broker task keeps the
//! write half inside a [`Connection`] (with its state machine), while a
//! spawned [`reader`] task owns the read half and forwards decoded frames
//! to the broker as [`ConnEvent`]s. Readers never touch shared state, so
//! the broker task remains the single mutator.

pub mod reader;
pub mod state;

pub use reader::run_reader;
pub use state::{Connection, ConnectionState};

use crate::wire::Frame;

/// Event forwarded from a connection's reader task to the broker
#[derive(Debug)]
pub enum ConnEvent {
    /// A decoded frame arrived on `conn`
    Frame { conn: u64, frame: Frame },
    /// The connection reached EOF or failed; the reader has exited
    Closed { conn: u64 },
}
