//! Per-topic ordered message journal
//!
//! Each topic owns a [`TopicJournal`]: a dense, monotonically numbered log
//! of rendered publications. The newest suffix stays in a bounded in-memory
//! window so hot-path appends and live fan-out never touch the disk; when
//! the window fills, the oldest quarter is drained to an append-only text
//! file. Ranged reads for store-and-forward catch-up span the file/window
//! boundary transparently.

mod log;

pub use log::TopicJournal;

/// Default bound on the in-memory window, in entries
pub const DEFAULT_WINDOW_CAPACITY: usize = 500;
