//! The public operation surface of the document store.

pub mod options;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, info, warn};

use crate::document::{Document, FieldPath};
use crate::error::{Error, Result};
use crate::index::{IndexEngine, Scan};
use crate::journal::{self, JournalRecord, JournalWriter, ReplayStats};
use crate::query::{self, Plan, Predicate, QueryResults};
use crate::snapshot::{self, SnapshotInfo};
use crate::types::{Entry, Key, Sequence, validate_key};

pub use options::StoreOptions;

/// Everything guarded by the store lock. The journal sits under the same
/// lock as the index so journal order always matches mutation order.
struct State {
    engine: IndexEngine,
    journal: Option<JournalWriter>,
}

impl State {
    /// Journal (if enabled) and apply a write of `document` to `key`.
    ///
    /// The document has already been validated; the journal append is the
    /// last step that can fail, so a failed write leaves no trace in memory.
    fn write(
        &mut self,
        key: &str,
        document: Document,
        record: fn(Sequence, &str, &Document) -> JournalRecord,
    ) -> Result<Sequence> {
        let sequence = self.engine.sequence() + 1;
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&record(sequence, key, &document))?;
        }
        self.engine.put_at(key, Arc::new(document), sequence);
        Ok(sequence)
    }
}

/// An in-memory document store.
///
/// All state sits behind one `parking_lot::RwLock`: lookups, scans, queries
/// and `save` share it, mutations, index changes and `load` take it
/// exclusively. Scans and queries copy their result set (shared document
/// handles, not deep copies) under the lock, so the iterators they return
/// never block writers.
///
/// A store opened with [`Store::open`] also journals every mutation next to
/// its home snapshot and recovers from both on the next open.
pub struct Store {
    state: RwLock<State>,
    options: Option<StoreOptions>,
}

impl Default for Store {
    fn default() -> Self {
        Store::in_memory()
    }
}

impl Store {
    /// A store with no data directory. `save`/`load` still work with
    /// explicit paths.
    pub fn in_memory() -> Self {
        Store {
            state: RwLock::new(State {
                engine: IndexEngine::new(),
                journal: None,
            }),
            options: None,
        }
    }

    /// Open a durable store in `options.dir()`, creating the directory if
    /// needed.
    ///
    /// Loads the home snapshot if there is one, replays its journal, then
    /// keeps appending to that journal.
    pub fn open(options: StoreOptions) -> Result<Self> {
        fs::create_dir_all(options.dir())?;
        let snapshot_path = options.snapshot_path();
        let journal_path = options.journal_path();

        let mut engine = if snapshot_path.exists() {
            let snapshot = snapshot::load(&snapshot_path)?;
            IndexEngine::from_entries(snapshot.entries, snapshot.header.sequence, Vec::new())?
        } else {
            IndexEngine::new()
        };
        let stats = if journal_path.exists() {
            journal::truncate_torn_tail(&journal_path)?;
            journal::replay(&mut engine, &journal_path)?
        } else {
            ReplayStats::default()
        };
        let writer = JournalWriter::open(&journal_path, options.policy())?;

        info!(
            dir = %options.dir().display(),
            documents = engine.len(),
            sequence = engine.sequence(),
            replayed = stats.applied,
            "Store opened"
        );
        Ok(Store {
            state: RwLock::new(State {
                engine,
                journal: Some(writer),
            }),
            options: Some(options),
        })
    }

    /// Add a document under a new key. Fails with `DuplicateKey` if the key
    /// is already live.
    pub fn insert(&self, key: &str, document: Document) -> Result<Sequence> {
        validate_key(key)?;
        document.validate()?;
        let mut state = self.state.write();
        if state.engine.contains_key(key) {
            return Err(Error::DuplicateKey(key.to_owned()));
        }
        let sequence = state.write(key, document, JournalRecord::insert)?;
        debug!(key, sequence, "Inserted");
        Ok(sequence)
    }

    /// Replace the document under an existing key. Fails with `NotFound` if
    /// the key is not live.
    pub fn update(&self, key: &str, document: Document) -> Result<Sequence> {
        validate_key(key)?;
        document.validate()?;
        let mut state = self.state.write();
        if !state.engine.contains_key(key) {
            return Err(Error::NotFound(key.to_owned()));
        }
        let sequence = state.write(key, document, JournalRecord::update)?;
        debug!(key, sequence, "Updated");
        Ok(sequence)
    }

    /// Replace the document under `key` only if its current sequence is
    /// `expected`. Fails with `SequenceMismatch` when another write got
    /// there first.
    pub fn update_if(&self, key: &str, expected: Sequence, document: Document) -> Result<Sequence> {
        validate_key(key)?;
        document.validate()?;
        let mut state = self.state.write();
        let actual = state.engine.get(key)?.sequence;
        if actual != expected {
            return Err(Error::SequenceMismatch {
                key: key.to_owned(),
                expected,
                actual,
            });
        }
        state.write(key, document, JournalRecord::update)
    }

    /// Insert or replace.
    pub fn upsert(&self, key: &str, document: Document) -> Result<Sequence> {
        validate_key(key)?;
        document.validate()?;
        let mut state = self.state.write();
        if state.engine.contains_key(key) {
            state.write(key, document, JournalRecord::update)
        } else {
            state.write(key, document, JournalRecord::insert)
        }
    }

    /// Remove a document, returning it. Fails with `NotFound` if the key is
    /// not live.
    pub fn delete(&self, key: &str) -> Result<Document> {
        validate_key(key)?;
        let mut state = self.state.write();
        if !state.engine.contains_key(key) {
            return Err(Error::NotFound(key.to_owned()));
        }
        let sequence = state.engine.sequence() + 1;
        if let Some(journal) = state.journal.as_mut() {
            journal.append(&JournalRecord::delete(sequence, key))?;
        }
        let entry = state
            .engine
            .remove_at(key, sequence)
            .ok_or_else(|| Error::NotFound(key.to_owned()))?;
        debug!(key, sequence, "Deleted");
        Ok(Arc::unwrap_or_clone(entry.document))
    }

    pub fn get(&self, key: &str) -> Result<Document> {
        validate_key(key)?;
        let state = self.state.read();
        Ok(Document::clone(&state.engine.get(key)?.document))
    }

    /// The document with the sequence of its latest write, for use with
    /// [`Store::update_if`].
    pub fn get_entry(&self, key: &str) -> Result<Entry> {
        validate_key(key)?;
        Ok(self.state.read().engine.get(key)?.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.read().engine.contains_key(key)
    }

    /// Point-in-time copy of every entry, in key order.
    pub fn scan(&self) -> Scan {
        self.state.read().engine.scan()
    }

    /// Every `(key, document)` pair, in key order.
    pub fn get_all(&self) -> Vec<(Key, Document)> {
        self.scan()
            .map(|entry| (entry.key, Arc::unwrap_or_clone(entry.document)))
            .collect()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.scan().map(|entry| entry.key).collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().engine.is_empty()
    }

    /// Sequence of the latest mutation.
    pub fn sequence(&self) -> Sequence {
        self.state.read().engine.sequence()
    }

    /// Documents matching `predicate`, in key order.
    ///
    /// A malformed field path in the predicate is a `Path` error; a path
    /// that simply does not resolve against some document is a non-match.
    pub fn query(&self, predicate: &Predicate) -> Result<QueryResults> {
        predicate.check_paths()?;
        let state = self.state.read();
        Ok(query::evaluate(predicate, &state.engine))
    }

    /// The plan `query` would use for `predicate`.
    pub fn explain(&self, predicate: &Predicate) -> Result<Plan> {
        predicate.check_paths()?;
        let state = self.state.read();
        Ok(query::planner::plan(predicate, &state.engine))
    }

    /// Build a secondary index on `path`. Returns `false` if it already
    /// existed.
    pub fn create_index(&self, path: &str) -> Result<bool> {
        let path = FieldPath::parse(path)?;
        Ok(self.state.write().engine.create_index(path))
    }

    pub fn drop_index(&self, path: &str) -> Result<()> {
        let path = FieldPath::parse(path)?;
        self.state.write().engine.drop_index(&path)?;
        debug!(path = %path, "Dropped secondary index");
        Ok(())
    }

    /// Indexed field paths, sorted.
    pub fn indexes(&self) -> Vec<String> {
        self.state
            .read()
            .engine
            .index_paths()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Write a snapshot to `path`.
    ///
    /// Holds the lock in upgradable-read mode: readers continue, writers wait,
    /// and the state cannot change while it is serialized. Saving to the
    /// store's home snapshot also truncates the journal, since the snapshot
    /// now covers every record in it.
    pub fn save(&self, path: &Path) -> Result<SnapshotInfo> {
        let state = self.state.upgradable_read();
        let info = snapshot::save(&state.engine, path)?;
        if self.is_home(path) && state.journal.is_some() {
            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            if let Some(journal) = state.journal.as_mut() {
                journal.reset()?;
            }
        }
        Ok(info)
    }

    /// Save to the home snapshot and truncate the journal.
    pub fn checkpoint(&self) -> Result<SnapshotInfo> {
        let home = self.home().ok_or_else(|| {
            Error::InvalidOperation("checkpoint needs a store opened with a data directory".into())
        })?;
        self.save(&home)
    }

    /// Replace the whole store with the snapshot at `path`.
    ///
    /// If a journal sits next to that snapshot, its records newer than the
    /// snapshot are replayed on top. Indexes registered on this store are
    /// rebuilt over the loaded documents. Nothing changes unless the whole
    /// snapshot and journal read cleanly.
    ///
    /// When this store journals and `path` is not its home snapshot, the
    /// loaded state is first checkpointed to the home snapshot, so a later
    /// [`Store::open`] recovers what was loaded. The sequence then continues
    /// from this store's own sequence rather than the loaded one.
    pub fn load(&self, path: &Path) -> Result<()> {
        let snapshot = snapshot::load(path)?;
        let journal_path = journal::journal_path(path);

        let mut state = self.state.write();
        let mut engine = IndexEngine::from_entries(
            snapshot.entries,
            snapshot.header.sequence,
            state.engine.index_paths(),
        )?;
        if journal_path.exists() {
            journal::replay(&mut engine, &journal_path)?;
        }

        if state.journal.is_some() && !self.is_home(path) {
            if let Some(home) = self.home() {
                // Every record in the current journal must sort at or below the
                // new home snapshot, or a failed reset would let them replay
                // over the loaded state on the next open.
                engine.advance_sequence(state.engine.sequence());
                warn!(
                    from = %path.display(),
                    home = %home.display(),
                    "Loaded a foreign snapshot; checkpointing it as the home snapshot"
                );
                snapshot::save(&engine, &home)?;
                if let Some(journal) = state.journal.as_mut() {
                    journal.reset()?;
                }
            }
        }

        info!(
            path = %path.display(),
            documents = engine.len(),
            sequence = engine.sequence(),
            "Store loaded"
        );
        state.engine = engine;
        Ok(())
    }

    /// Force any journal records not yet fsync'd to disk.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        match state.journal.as_mut() {
            Some(journal) => journal.sync(),
            None => Ok(()),
        }
    }

    pub fn options(&self) -> Option<&StoreOptions> {
        self.options.as_ref()
    }

    fn home(&self) -> Option<PathBuf> {
        self.options.as_ref().map(StoreOptions::snapshot_path)
    }

    fn is_home(&self, path: &Path) -> bool {
        let Some(home) = self.home() else {
            return false;
        };
        if home == path {
            return true;
        }
        match (fs::canonicalize(&home), fs::canonicalize(path)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
