pub mod secondary;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use tracing::debug;
use xxhash_rust::xxh3::Xxh3Builder;

use crate::document::{Document, FieldPath, Value};
use crate::error::{Error, Result};
use crate::types::{Entry, Key, Sequence};

pub use secondary::SecondaryIndex;

/// Hash builder for every map keyed by caller-controlled bytes. The seed is
/// drawn once per process.
pub(crate) fn hasher() -> Xxh3Builder {
    static SEED: OnceLock<u64> = OnceLock::new();
    Xxh3Builder::new().with_seed(*SEED.get_or_init(rand::random))
}

/// The in-memory state of a store: primary key → entry map, the secondary
/// indexes over it, and the global sequence counter.
///
/// Every mutation goes through `put_at`/`remove_at`, which keep the secondary
/// indexes in step with the primary map: a rewritten key first drops all of
/// its old pairs, then indexes the new document.
///
/// Not synchronized. The store wraps it in a single `RwLock`.
#[derive(Debug)]
pub struct IndexEngine {
    entries: HashMap<Key, Entry, Xxh3Builder>,
    secondary: BTreeMap<FieldPath, SecondaryIndex>,
    sequence: Sequence,
}

impl Default for IndexEngine {
    fn default() -> Self {
        IndexEngine::new()
    }
}

impl IndexEngine {
    pub fn new() -> Self {
        IndexEngine {
            entries: HashMap::with_hasher(hasher()),
            secondary: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// Build an engine from decoded snapshot entries, then build every index
    /// in `index_paths` with a single pass over the entries.
    pub fn from_entries(
        entries: Vec<Entry>,
        sequence: Sequence,
        index_paths: impl IntoIterator<Item = FieldPath>,
    ) -> Result<Self> {
        let mut engine = IndexEngine::new();
        engine.entries.reserve(entries.len());
        for entry in entries {
            if entry.sequence > sequence {
                return Err(Error::Format(format!(
                    "entry {:?} has sequence {} beyond global sequence {}",
                    entry.key, entry.sequence, sequence
                )));
            }
            let key = entry.key.clone();
            if engine.entries.insert(key.clone(), entry).is_some() {
                return Err(Error::Format(format!("duplicate key {key:?} in snapshot")));
            }
        }
        engine.sequence = sequence;

        let mut indexes: Vec<SecondaryIndex> =
            index_paths.into_iter().map(SecondaryIndex::new).collect();
        for entry in engine.entries.values() {
            for index in &mut indexes {
                index.insert(&entry.key, &entry.document);
            }
        }
        engine.secondary = indexes
            .into_iter()
            .map(|index| (index.path().clone(), index))
            .collect();
        Ok(engine)
    }

    /// Insert or replace `key`, allocating the next sequence number.
    pub fn put(&mut self, key: &str, document: Document) -> Result<Sequence> {
        document.validate()?;
        let sequence = self.sequence + 1;
        self.put_at(key, Arc::new(document), sequence);
        Ok(sequence)
    }

    /// Insert or replace `key` at a known sequence (journal replay).
    /// The global counter never moves backwards.
    pub(crate) fn put_at(&mut self, key: &str, document: Arc<Document>, sequence: Sequence) {
        for index in self.secondary.values_mut() {
            index.insert(key, &document);
        }
        self.entries.insert(
            key.to_owned(),
            Entry {
                key: key.to_owned(),
                document,
                sequence,
            },
        );
        self.sequence = self.sequence.max(sequence);
    }

    pub fn get(&self, key: &str) -> Result<&Entry> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_owned()))
    }

    /// Remove `key` and all of its secondary-index pairs.
    pub fn delete(&mut self, key: &str) -> Result<Entry> {
        if !self.entries.contains_key(key) {
            return Err(Error::NotFound(key.to_owned()));
        }
        let sequence = self.sequence + 1;
        self.remove_at(key, sequence)
            .ok_or_else(|| Error::NotFound(key.to_owned()))
    }

    /// Remove `key` if present, recording `sequence` as seen.
    pub(crate) fn remove_at(&mut self, key: &str, sequence: Sequence) -> Option<Entry> {
        self.sequence = self.sequence.max(sequence);
        let removed = self.entries.remove(key)?;
        for index in self.secondary.values_mut() {
            index.remove(key);
        }
        Some(removed)
    }

    /// Point-in-time copy of every entry, ordered by key.
    ///
    /// Documents are shared, not deep-copied; later mutations replace the
    /// `Arc` in the map and leave the scanned ones untouched.
    pub fn scan(&self) -> Scan {
        let mut entries: Vec<Entry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Scan {
            inner: entries.into_iter(),
        }
    }

    /// Build an index over `path` from all current entries.
    /// Returns `false` if the path was already indexed.
    pub fn create_index(&mut self, path: FieldPath) -> bool {
        if self.secondary.contains_key(&path) {
            return false;
        }
        let mut index = SecondaryIndex::new(path.clone());
        for entry in self.entries.values() {
            index.insert(&entry.key, &entry.document);
        }
        debug!(
            path = %path,
            indexed = index.indexed_keys(),
            distinct = index.distinct_values(),
            "Built secondary index"
        );
        self.secondary.insert(path, index);
        true
    }

    pub fn drop_index(&mut self, path: &FieldPath) -> Result<()> {
        self.secondary
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("index on {path}")))
    }

    pub fn index(&self, path: &FieldPath) -> Option<&SecondaryIndex> {
        self.secondary.get(path)
    }

    /// Keys holding `value` at `path`, if `path` is indexed.
    pub fn lookup(&self, path: &FieldPath, value: &Value) -> Option<BTreeSet<Key>> {
        let index = self.secondary.get(path)?;
        Some(index.lookup(value).cloned().unwrap_or_default())
    }

    pub fn index_paths(&self) -> Vec<FieldPath> {
        self.secondary.keys().cloned().collect()
    }

    /// Entries ordered by key, for writing a snapshot.
    pub fn sorted_entries(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raise the global counter to at least `sequence`. Entry sequences are
    /// unchanged.
    pub(crate) fn advance_sequence(&mut self, sequence: Sequence) {
        self.sequence = self.sequence.max(sequence);
    }

    /// Sequence of the most recent mutation (0 for a fresh engine).
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }
}

/// Iterator over a point-in-time copy of the primary index.
pub struct Scan {
    inner: std::vec::IntoIter<Entry>,
}

impl Iterator for Scan {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Scan {}
