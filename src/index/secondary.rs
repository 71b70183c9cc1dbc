use std::collections::{BTreeSet, HashMap};

use xxhash_rust::xxh3::Xxh3Builder;

use crate::document::codec::canonical_key;
use crate::document::{Document, FieldPath, Value};
use crate::index::hasher;
use crate::types::Key;

/// Field value → keys index over one field path.
///
/// Values are keyed by their canonical encoding, which leads with the type
/// tag, so `"30"` and `30` land in different buckets. A reverse map from key
/// to its indexed value lets a replaced or deleted document drop exactly its
/// own pair.
///
/// Documents where the path does not resolve are simply absent.
#[derive(Debug)]
pub struct SecondaryIndex {
    path: FieldPath,
    postings: HashMap<Vec<u8>, BTreeSet<Key>, Xxh3Builder>,
    by_key: HashMap<Key, Vec<u8>, Xxh3Builder>,
}

impl SecondaryIndex {
    pub fn new(path: FieldPath) -> Self {
        SecondaryIndex {
            path,
            postings: HashMap::with_hasher(hasher()),
            by_key: HashMap::with_hasher(hasher()),
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Index `doc` under `key`, replacing whatever `key` had before.
    pub fn insert(&mut self, key: &str, doc: &Document) {
        self.remove(key);
        let Ok(value) = doc.resolve(&self.path) else {
            return;
        };
        let bucket = canonical_key(value);
        self.postings
            .entry(bucket.clone())
            .or_default()
            .insert(key.to_owned());
        self.by_key.insert(key.to_owned(), bucket);
    }

    /// Drop the pair held by `key`, if any.
    pub fn remove(&mut self, key: &str) {
        let Some(bucket) = self.by_key.remove(key) else {
            return;
        };
        if let Some(keys) = self.postings.get_mut(&bucket) {
            keys.remove(key);
            if keys.is_empty() {
                self.postings.remove(&bucket);
            }
        }
    }

    /// Keys whose document holds exactly `value` at this path.
    pub fn lookup(&self, value: &Value) -> Option<&BTreeSet<Key>> {
        self.postings.get(&canonical_key(value))
    }

    /// Number of keys that `lookup(value)` would return.
    pub fn estimate(&self, value: &Value) -> usize {
        self.lookup(value).map_or(0, BTreeSet::len)
    }

    /// Number of distinct indexed values.
    pub fn distinct_values(&self) -> usize {
        self.postings.len()
    }

    /// Number of keys with an indexed value.
    pub fn indexed_keys(&self) -> usize {
        self.by_key.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }
}
