use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::journal::record::JournalRecord;

/// Reads journal records back for recovery.
///
/// Loads the entire file into memory, then iterates record by record. If a
/// record fails to decode, iteration stops there: it was a partial write
/// from a crash, and every record before it is valid.
pub struct JournalReader {
    path: PathBuf,
    data: Vec<u8>,
}

impl JournalReader {
    /// Open a journal file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(JournalReader {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Iterate over all valid records, in file order.
    pub fn iter(&self) -> JournalIterator<'_> {
        JournalIterator {
            path: &self.path,
            data: &self.data,
            offset: 0,
        }
    }

    /// All valid records sorted by sequence.
    pub fn records(&self) -> Vec<JournalRecord> {
        let mut records: Vec<JournalRecord> = self.iter().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    /// Length of the prefix made of intact records.
    pub fn valid_len(&self) -> usize {
        let mut iter = self.iter();
        let mut valid = 0;
        while iter.next().is_some() {
            valid = iter.offset();
        }
        valid
    }

    /// Size of the journal file in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Iterator over journal records. Yields records until EOF or the first
/// record that fails to decode.
pub struct JournalIterator<'a> {
    path: &'a Path,
    data: &'a [u8],
    offset: usize,
}

impl JournalIterator<'_> {
    /// Bytes consumed by the records yielded so far.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for JournalIterator<'_> {
    type Item = JournalRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        match JournalRecord::decode(&self.data[self.offset..]) {
            Ok(record) => {
                self.offset += record.encoded_size();
                Some(record)
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    discarded = self.data.len() - self.offset,
                    %error,
                    "Stopping at unreadable journal record"
                );
                self.offset = self.data.len();
                None
            }
        }
    }
}
