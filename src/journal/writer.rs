use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::journal::SyncPolicy;
use crate::journal::record::JournalRecord;

/// Appends journal records to a file.
///
/// Two steps per record:
///   file.write_all()   → OS page cache
///   file.sync_all()    → OS page cache → physical disk
///
/// Each record is encoded whole and written straight to the file, so no
/// bytes of a record sit in a userspace buffer after `append` returns. The
/// sync policy decides how often the page cache is forced to disk.
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    offset: u64,
    sync_policy: SyncPolicy,
    writes_since_sync: usize,
    failed: bool,
}

impl JournalWriter {
    /// Open (or create) the journal at `path` for appending.
    pub fn open(path: &Path, sync_policy: SyncPolicy) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();

        Ok(JournalWriter {
            path: path.to_path_buf(),
            file,
            offset,
            sync_policy,
            writes_since_sync: 0,
            failed: false,
        })
    }

    /// Append a record. Depending on the sync policy, may fsync after it.
    ///
    /// On failure the file is cut back to where the record started and the
    /// writer refuses every further call; the store has to be reopened,
    /// which replays up to the last intact record.
    pub fn append(&mut self, record: &JournalRecord) -> Result<()> {
        self.check_usable()?;
        let result = self.write_record(record);
        if result.is_err() {
            self.failed = true;
            if let Err(error) = self.file.set_len(self.offset) {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    %error,
                    "Could not roll back failed journal append"
                );
            }
        }
        result
    }

    fn write_record(&mut self, record: &JournalRecord) -> Result<()> {
        let encoded = record.encode();

        self.file.write_all(&encoded)?;
        self.offset += encoded.len() as u64;
        self.writes_since_sync += 1;

        let due = match self.sync_policy {
            SyncPolicy::EveryWrite => true,
            SyncPolicy::EveryNWrites(n) => self.writes_since_sync >= n.max(1),
        };
        if due {
            self.file.sync_all()?;
            self.writes_since_sync = 0;
        }

        Ok(())
    }

    /// Force fsync to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.check_usable()?;
        self.file.sync_all()?;
        self.writes_since_sync = 0;
        Ok(())
    }

    /// Drop every record. Called once a snapshot covering them is durable.
    pub fn reset(&mut self) -> Result<()> {
        self.check_usable()?;
        self.file.set_len(0)?;
        self.file.sync_all()?;
        debug!(path = %self.path.display(), dropped_bytes = self.offset, "Journal reset");
        self.offset = 0;
        self.writes_since_sync = 0;
        Ok(())
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(Error::InvalidOperation(format!(
                "journal {} failed an earlier write",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Current file length (bytes written so far).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Records appended since the last fsync.
    pub fn pending_sync(&self) -> usize {
        self.writes_since_sync
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
