//! Point-in-time snapshot of the primary index.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┬─────────────────┐
//! │ Magic (8B)   │ Version (4B) │ Entry count (8B) │ Global seq (8B) │
//! └──────────────┴──────────────┴──────────────────┴─────────────────┘
//! then per entry, ordered by key:
//! ┌─────────────┬───────────┬─────────────┬───────────┬──────────┐
//! │ KeyLen (4B) │ Key (var) │ DocLen (8B) │ Doc (var) │ Seq (8B) │
//! └─────────────┴───────────┴─────────────┴───────────┴──────────┘
//! ```
//!
//! All integers little-endian. Documents use the tagged encoding from
//! [`crate::document::codec`]. Secondary indexes are not stored; the loader
//! rebuilds them.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::codec::{ByteReader, decode_document, encode_document};
use crate::error::{Error, Result};
use crate::index::IndexEngine;
use crate::types::{Entry, Sequence};

/// Identifies a snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 8] = *b"MEMODOCS";

/// Only format this build reads or writes.
pub const FORMAT_VERSION: u32 = 1;

/// Magic + version + entry count + global sequence.
pub const HEADER_SIZE: usize = 8 + 4 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub entry_count: u64,
    pub sequence: Sequence,
}

impl SnapshotHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&SNAPSHOT_MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..20].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.sequence.to_le_bytes());
        buf
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let magic: [u8; 8] = reader
            .array()
            .map_err(|_| Error::Format("file too short for a snapshot header".into()))?;
        if magic != SNAPSHOT_MAGIC {
            return Err(Error::Format(format!("bad magic: {magic:02x?}")));
        }
        let version = reader.u32()?;
        if version != FORMAT_VERSION {
            return Err(Error::Format(format!(
                "unsupported snapshot version {version} (expected {FORMAT_VERSION})"
            )));
        }
        Ok(SnapshotHeader {
            version,
            entry_count: reader.u64()?,
            sequence: reader.u64()?,
        })
    }
}

/// A decoded snapshot, not yet installed in a store.
#[derive(Debug)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    pub entries: Vec<Entry>,
}

/// Summary of a written snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub entry_count: u64,
    pub sequence: Sequence,
    pub size_bytes: u64,
}

/// Serialize `engine` to `out`. Returns the number of bytes written.
pub fn write_to<W: Write>(engine: &IndexEngine, out: &mut W) -> Result<u64> {
    let entries = engine.sorted_entries();
    let header = SnapshotHeader {
        version: FORMAT_VERSION,
        entry_count: entries.len() as u64,
        sequence: engine.sequence(),
    };
    out.write_all(&header.encode())?;
    let mut written = HEADER_SIZE as u64;

    for entry in entries {
        let doc = encode_document(&entry.document);
        out.write_all(&(entry.key.len() as u32).to_le_bytes())?;
        out.write_all(entry.key.as_bytes())?;
        out.write_all(&(doc.len() as u64).to_le_bytes())?;
        out.write_all(&doc)?;
        out.write_all(&entry.sequence.to_le_bytes())?;
        written += (4 + entry.key.len() + 8 + doc.len() + 8) as u64;
    }
    Ok(written)
}

/// Write a snapshot of `engine` to `path`, replacing any previous file
/// atomically.
///
/// The data goes to `<path>.tmp`, is fsync'd, and is then renamed over
/// `path`. On any failure the temp file is removed and `path` is untouched.
pub fn save(engine: &IndexEngine, path: &Path) -> Result<SnapshotInfo> {
    let temp_path = temp_path(path);
    debug!(path = %path.display(), temp = %temp_path.display(), "Writing snapshot");

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    if temp_path.exists() {
        warn!(path = %temp_path.display(), "Removing stale temp file");
        fs::remove_file(&temp_path)?;
    }

    let result = write_file(engine, &temp_path).and_then(|size_bytes| {
        fs::rename(&temp_path, path)?;
        Ok(size_bytes)
    });
    let size_bytes = match result {
        Ok(size) => size,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(path = %temp_path.display(), error = %cleanup, "Temp file not removed");
            }
            return Err(e);
        }
    };

    info!(
        path = %path.display(),
        entries = engine.len(),
        sequence = engine.sequence(),
        size_bytes,
        "Snapshot written"
    );
    Ok(SnapshotInfo {
        path: path.to_path_buf(),
        entry_count: engine.len() as u64,
        sequence: engine.sequence(),
        size_bytes,
    })
}

fn write_file(engine: &IndexEngine, path: &Path) -> Result<u64> {
    let mut writer = BufWriter::new(File::create(path)?);
    let size = write_to(engine, &mut writer)?;
    let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(size)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Decode a snapshot held in memory.
///
/// The whole buffer must be exactly one header plus the declared number of
/// entries.
pub fn decode(data: &[u8]) -> Result<Snapshot> {
    let mut reader = ByteReader::new(data);
    let header = SnapshotHeader::decode(&mut reader)?;

    // Smallest possible entry: 4 + 1 + 8 + 5 (empty map) + 8 bytes.
    let max_entries = (reader.remaining() / 26) as u64;
    if header.entry_count > max_entries {
        return Err(Error::Format(format!(
            "header declares {} entries but only {} bytes follow",
            header.entry_count,
            reader.remaining()
        )));
    }

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    for _ in 0..header.entry_count {
        let key = reader.string()?;
        if key.is_empty() {
            return Err(Error::Format(format!("empty key at offset {}", reader.offset())));
        }
        let doc_len = usize::try_from(reader.u64()?)
            .map_err(|_| Error::Format("document length overflows usize".into()))?;
        let document = decode_document(reader.take(doc_len)?)?;
        let sequence = reader.u64()?;
        entries.push(Entry {
            key,
            document: Arc::new(document),
            sequence,
        });
    }
    reader.finish()?;

    Ok(Snapshot { header, entries })
}

/// Read and decode the snapshot at `path`.
pub fn load(path: &Path) -> Result<Snapshot> {
    let data = fs::read(path)?;
    let snapshot = decode(&data)?;
    info!(
        path = %path.display(),
        entries = snapshot.entries.len(),
        sequence = snapshot.header.sequence,
        "Snapshot read"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn engine() -> IndexEngine {
        let mut engine = IndexEngine::new();
        engine.put("b", Document::new().with("n", 2)).unwrap();
        engine.put("a", Document::new().with("n", 1)).unwrap();
        engine.put("b", Document::new().with("n", 3)).unwrap();
        engine
    }

    fn encoded(engine: &IndexEngine) -> Vec<u8> {
        let mut buf = Vec::new();
        let written = write_to(engine, &mut buf).unwrap();
        assert_eq!(written, buf.len() as u64);
        buf
    }

    #[test]
    fn header_layout() {
        let buf = encoded(&engine());
        assert_eq!(&buf[0..8], b"MEMODOCS");
        assert_eq!(u32::from_le_bytes(buf[8..12].try_into().unwrap()), FORMAT_VERSION);
        assert_eq!(u64::from_le_bytes(buf[12..20].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(buf[20..28].try_into().unwrap()), 3);
        // first entry is "a": keyLen = 1, key = 'a'
        assert_eq!(u32::from_le_bytes(buf[28..32].try_into().unwrap()), 1);
        assert_eq!(buf[32], b'a');
    }

    #[test]
    fn decode_restores_entries_and_sequences() {
        let snapshot = decode(&encoded(&engine())).unwrap();
        assert_eq!(snapshot.header.sequence, 3);
        let summary: Vec<(String, u64)> = snapshot
            .entries
            .iter()
            .map(|e| (e.key.clone(), e.sequence))
            .collect();
        assert_eq!(summary, vec![("a".into(), 2), ("b".into(), 3)]);
        assert_eq!(*snapshot.entries[1].document, Document::new().with("n", 3));
    }

    #[test]
    fn unsupported_version_is_format_error() {
        let mut buf = encoded(&engine());
        buf[8..12].copy_from_slice(&2u32.to_le_bytes());
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, Error::Format(msg) if msg.contains("version")));
    }

    #[test]
    fn bad_magic_is_format_error() {
        let mut buf = encoded(&engine());
        buf[0] = b'X';
        assert!(matches!(decode(&buf), Err(Error::Format(_))));
        assert!(matches!(decode(b"MEMO"), Err(Error::Format(_))));
    }

    #[test]
    fn truncated_or_padded_file_is_rejected() {
        let buf = encoded(&engine());
        assert!(decode(&buf[..buf.len() - 1]).is_err());
        let mut padded = buf.clone();
        padded.push(0);
        assert!(decode(&padded).is_err());
    }

    #[test]
    fn inflated_entry_count_is_rejected() {
        let mut buf = encoded(&engine());
        buf[12..20].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode(&buf), Err(Error::Format(_))));
    }

    #[test]
    fn save_replaces_atomically_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.snapshot");

        let info = save(&engine(), &path).unwrap();
        assert_eq!(info.entry_count, 2);
        assert_eq!(info.size_bytes, fs::metadata(&path).unwrap().len());
        assert!(!temp_path(&path).exists());

        let snapshot = load(&path).unwrap();
        assert_eq!(snapshot.entries.len(), 2);
    }

    #[test]
    fn save_into_missing_location_fails_with_io() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        // parent is a regular file, so the snapshot cannot be created
        let err = save(&engine(), &blocker.join("store.snapshot")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
