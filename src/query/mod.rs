//! Predicate evaluation over the index engine.

pub mod planner;
pub mod predicate;

use std::sync::Arc;

use tracing::debug;

use crate::document::Document;
use crate::index::IndexEngine;
use crate::types::{Entry, Key};

pub use planner::Plan;
pub use predicate::Predicate;

/// Run `predicate` against `engine` and collect the matching entries.
///
/// The entries (shared document handles) are gathered while the caller holds
/// its lock; the returned iterator hands out owned documents lazily after the
/// lock is gone.
pub fn evaluate(predicate: &Predicate, engine: &IndexEngine) -> QueryResults {
    let plan = planner::plan(predicate, engine);
    let matched: Vec<Entry> = match planner::candidates(&plan, engine) {
        Some(keys) => keys
            .iter()
            .filter_map(|key| engine.get(key).ok())
            .filter(|entry| predicate.matches(&entry.document))
            .cloned()
            .collect(),
        None => engine
            .scan()
            .filter(|entry| predicate.matches(&entry.document))
            .collect(),
    };
    debug!(plan = %plan, matched = matched.len(), "Evaluated query");
    QueryResults {
        inner: matched.into_iter(),
    }
}

/// Matching `(key, document)` pairs in key order.
///
/// Finite and single-pass. The set is fixed when the query runs; later
/// writes to the store do not show up in it.
#[derive(Debug)]
pub struct QueryResults {
    inner: std::vec::IntoIter<Entry>,
}

impl QueryResults {
    /// Keys of the remaining results, without cloning documents.
    pub fn keys(self) -> Vec<Key> {
        self.inner.map(|entry| entry.key).collect()
    }
}

impl Iterator for QueryResults {
    type Item = (Key, Document);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|entry| (entry.key, Arc::unwrap_or_clone(entry.document)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for QueryResults {}
