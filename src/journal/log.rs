//! Journal implementation: bounded window + append-only backing file

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Ordered, numbered message store for one topic
///
/// Entries are kept as `"<seq> <rendered>"` both in the window and in the
/// file, so a line is self-describing wherever it lives. Sequences are dense
/// from 0; `last_sequence` is −1 while the journal is empty.
#[derive(Debug)]
pub struct TopicJournal {
    path: PathBuf,
    capacity: usize,
    drain: usize,
    last_sequence: i64,
    window: VecDeque<String>,
}

impl TopicJournal {
    /// Create a journal backed by `path`
    ///
    /// The backing file is written lazily by the first spill; a caller
    /// reusing a path from an earlier run must truncate it first (the
    /// registry does, through its sandbox). A quarter of the window is
    /// drained per spill so the amortized cost of a full window stays
    /// bounded.
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            drain: (capacity / 4).max(1),
            last_sequence: -1,
            window: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Sequence of the newest entry, −1 if empty
    pub fn last_sequence(&self) -> i64 {
        self.last_sequence
    }

    /// Total number of entries ever appended
    pub fn len(&self) -> usize {
        (self.last_sequence + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.last_sequence < 0
    }

    /// Number of entries currently held in memory
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one rendered publication, returning its sequence
    ///
    /// If the window is full immediately before the push, the oldest
    /// quarter is drained to the backing file first. A failed drain keeps
    /// the entries in memory; the message itself is never lost.
    pub fn append(&mut self, rendered: &str) -> i64 {
        if self.window.len() >= self.capacity {
            self.spill(self.drain);
        }
        self.last_sequence += 1;
        self.window
            .push_back(format!("{} {}", self.last_sequence, rendered));
        self.last_sequence
    }

    /// Fetch a single entry by sequence, without its number prefix
    pub fn get(&self, seq: i64) -> Option<String> {
        if seq < 0 || seq > self.last_sequence {
            return None;
        }
        let floor = self.window_floor();
        if seq >= floor {
            return self
                .window
                .get((seq - floor) as usize)
                .and_then(|line| split_entry(line))
                .map(|(_, payload)| payload.to_owned());
        }
        self.read_file_range(seq, seq).into_iter().next()
    }

    /// Entries in `[lo, hi]` in ascending sequence order, prefixes stripped
    ///
    /// `hi` is clamped to the last sequence and the bounds are swapped if
    /// given in reverse.
    pub fn range(&self, lo: i64, hi: i64) -> Vec<String> {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let lo = lo.max(0);
        let hi = hi.min(self.last_sequence);
        if lo > hi {
            return Vec::new();
        }

        let floor = self.window_floor();
        let mut out = Vec::with_capacity((hi - lo + 1) as usize);
        if lo < floor {
            out.extend(self.read_file_range(lo, hi.min(floor - 1)));
        }
        let mut seq = lo.max(floor);
        while seq <= hi {
            if let Some((_, payload)) = self
                .window
                .get((seq - floor) as usize)
                .and_then(|line| split_entry(line))
            {
                out.push(payload.to_owned());
            }
            seq += 1;
        }
        out
    }

    /// Drain the entire window to the backing file
    pub fn flush(&mut self) {
        self.spill(self.window.len());
    }

    /// Smallest sequence currently held in the window
    fn window_floor(&self) -> i64 {
        self.last_sequence - self.window.len() as i64 + 1
    }

    fn spill(&mut self, count: usize) {
        let count = count.min(self.window.len());
        if count == 0 {
            return;
        }
        match append_lines(&self.path, self.window.iter().take(count)) {
            Ok(()) => {
                self.window.drain(..count);
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    entries = count,
                    "journal spill failed; keeping entries in memory"
                );
            }
        }
    }

    /// Linear scan of the backing file for sequences in `[lo, hi]`
    ///
    /// The file is append-only and ascending, so the scan stops at the
    /// first line past `hi`.
    fn read_file_range(&self, lo: i64, hi: i64) -> Vec<String> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "journal file unreadable during replay"
                );
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let Some((seq, payload)) = split_entry(&line) else {
                continue;
            };
            if seq > hi {
                break;
            }
            if seq >= lo {
                out.push(payload.to_owned());
            }
        }
        out
    }
}

fn split_entry(line: &str) -> Option<(i64, &str)> {
    let (seq, payload) = line.split_once(' ')?;
    Some((seq.parse().ok()?, payload))
}

fn append_lines<'a>(
    path: &Path,
    lines: impl Iterator<Item = &'a String>,
) -> io::Result<()> {
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(dir: &tempfile::TempDir, capacity: usize) -> TopicJournal {
        TopicJournal::new(dir.path().join("topic"), capacity)
    }

    #[test]
    fn test_sequences_are_dense_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 8);
        assert_eq!(j.last_sequence(), -1);
        assert!(j.is_empty());
        for expected in 0..10 {
            assert_eq!(j.append("msg"), expected);
        }
        assert_eq!(j.last_sequence(), 9);
        assert_eq!(j.len(), 10);
    }

    #[test]
    fn test_spill_drains_a_quarter() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 8); // drain = 2
        for i in 0..8 {
            j.append(&format!("m{}", i));
        }
        assert_eq!(j.window_len(), 8);

        // Full window: the next append spills two entries first.
        j.append("m8");
        assert_eq!(j.window_len(), 7);

        let spilled = std::fs::read_to_string(j.path()).unwrap();
        assert_eq!(spilled, "0 m0\n1 m1\n");
    }

    #[test]
    fn test_get_spans_window_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 4); // drain = 1
        for i in 0..6 {
            j.append(&format!("m{}", i));
        }
        // Sequences 0 and 1 have been spilled, 2..=5 are in the window.
        assert_eq!(j.get(0).as_deref(), Some("m0"));
        assert_eq!(j.get(1).as_deref(), Some("m1"));
        assert_eq!(j.get(2).as_deref(), Some("m2"));
        assert_eq!(j.get(5).as_deref(), Some("m5"));
        assert_eq!(j.get(6), None);
        assert_eq!(j.get(-1), None);
    }

    #[test]
    fn test_range_spans_the_boundary_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 4);
        for i in 0..7 {
            j.append(&format!("m{}", i));
        }
        let all = j.range(0, 6);
        let expected: Vec<String> = (0..7).map(|i| format!("m{}", i)).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_range_swaps_and_clamps_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 8);
        for i in 0..4 {
            j.append(&format!("m{}", i));
        }
        assert_eq!(j.range(3, 1), vec!["m1", "m2", "m3"]);
        assert_eq!(j.range(2, 100), vec!["m2", "m3"]);
        assert_eq!(j.range(-5, 0), vec!["m0"]);
        assert!(j.range(4, 9).is_empty());
    }

    #[test]
    fn test_range_on_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let j = journal(&dir, 8);
        assert!(j.range(0, 100).is_empty());
    }

    #[test]
    fn test_flush_moves_everything_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 8);
        for i in 0..5 {
            j.append(&format!("m{}", i));
        }
        j.flush();
        assert_eq!(j.window_len(), 0);

        // Replay still sees every entry, now from the file.
        let expected: Vec<String> = (0..5).map(|i| format!("m{}", i)).collect();
        assert_eq!(j.range(0, 4), expected);

        // Appends keep numbering densely after a flush.
        assert_eq!(j.append("m5"), 5);
        assert_eq!(j.range(4, 5), vec!["m4", "m5"]);
    }

    #[test]
    fn test_single_entry_round_trip_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 4);
        for i in 0..9 {
            j.append(&format!("payload {}", i));
        }
        for seq in 0..=j.last_sequence() {
            assert_eq!(
                j.range(seq, seq),
                vec![format!("payload {}", seq)],
                "sequence {} should round-trip",
                seq
            );
        }
    }

    #[test]
    fn test_entries_may_contain_separators() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir, 2);
        let msg = "10.0.0.1:5000 - temp - INT - -42";
        j.append(msg);
        j.append(msg);
        j.append(msg); // forces a spill of sequence 0
        assert_eq!(j.get(0).as_deref(), Some(msg));
        assert_eq!(j.get(2).as_deref(), Some(msg));
    }
}
