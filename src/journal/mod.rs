//! Append-only journal of mutations made since the last snapshot.
//!
//! The journal lives next to its snapshot (`store.snapshot` →
//! `store.journal`). Every mutation is appended under the same write lock
//! that applies it, so journal order is index order. Saving the snapshot it
//! belongs to truncates it.

pub mod reader;
pub mod record;
pub mod writer;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::index::IndexEngine;

pub use reader::JournalReader;
pub use record::{JournalRecord, RecordType};
pub use writer::JournalWriter;

/// Controls when the journal is fsync'd to disk.
///
/// Trade-off: durability vs throughput.
///   - EveryWrite: no acknowledged mutation is lost, one fsync per mutation
///   - EveryNWrites: batched fsync, up to N-1 acknowledged mutations can be
///     lost on a crash (records are still flushed to the OS on every write)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// fsync after every record. Safest, slowest.
    #[default]
    EveryWrite,
    /// fsync every N records. `EveryNWrites(0)` behaves like `EveryNWrites(1)`.
    EveryNWrites(usize),
}

/// Journal file that belongs to the snapshot at `snapshot`.
pub fn journal_path(snapshot: &Path) -> PathBuf {
    snapshot.with_extension("journal")
}

/// Outcome of replaying a journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied to the engine.
    pub applied: usize,
    /// Records at or below the engine's sequence, already reflected in it.
    pub skipped: usize,
}

/// Apply the journal at `path` to `engine` in ascending sequence order.
///
/// Records whose sequence is at or below the engine's current sequence are
/// skipped, so replaying the same journal again is a no-op. Inserts and
/// updates overwrite; deletes of absent keys are ignored. A record that
/// passes its CRC but carries an undecodable document is a `Format` error,
/// and `engine` may then be partially replayed: callers replay into a
/// scratch engine and only install it on success.
pub fn replay(engine: &mut IndexEngine, path: &Path) -> Result<ReplayStats> {
    let reader = JournalReader::open(path)?;
    let mut stats = ReplayStats::default();

    for record in reader.records() {
        if record.sequence <= engine.sequence() {
            stats.skipped += 1;
            continue;
        }
        if record.key.is_empty() {
            return Err(Error::Format(format!(
                "journal record {} has an empty key",
                record.sequence
            )));
        }
        match record.decode_document()? {
            Some(document) => {
                document
                    .validate()
                    .map_err(|e| Error::Format(format!("journal record {}: {e}", record.sequence)))?;
                engine.put_at(&record.key, Arc::new(document), record.sequence);
            }
            None => {
                engine.remove_at(&record.key, record.sequence);
            }
        }
        stats.applied += 1;
    }

    info!(
        path = %path.display(),
        applied = stats.applied,
        skipped = stats.skipped,
        sequence = engine.sequence(),
        "Journal replayed"
    );
    Ok(stats)
}

/// Cut the journal at `path` back to its last intact record, so new appends
/// are not hidden behind a torn write. Returns the number of bytes dropped.
pub fn truncate_torn_tail(path: &Path) -> Result<u64> {
    let reader = JournalReader::open(path)?;
    let valid = reader.valid_len();
    let dropped = (reader.len() - valid) as u64;
    if dropped > 0 {
        warn!(path = %path.display(), valid_bytes = valid, dropped_bytes = dropped, "Truncating torn journal tail");
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(valid as u64)?;
        file.sync_all()?;
    }
    Ok(dropped)
}
