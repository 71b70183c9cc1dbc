//! # memodocs
//!
//! An embeddable in-memory document store.
//!
//! ## Core idea
//! Documents are schemaless maps of JSON-like values, stored under string
//! keys in a hash-based primary index. Secondary indexes over field paths
//! turn equality and membership queries into bucket lookups instead of full
//! scans, and every query still re-checks each candidate against the full
//! predicate.
//!
//! Durability is opt-in: [`Store::save`] writes an atomic binary snapshot,
//! and a store opened with [`Store::open`] also journals every mutation so a
//! crash loses nothing that was acknowledged.
//!
//! ```
//! use memodocs::{Document, Predicate, Store};
//!
//! let store = Store::in_memory();
//! store.create_index("age").unwrap();
//! store.insert("alice", Document::new().with("name", "Alice").with("age", 30)).unwrap();
//! store.insert("bob", Document::new().with("name", "Bob").with("age", 25)).unwrap();
//!
//! let keys = store.query(&Predicate::eq("age", 30)).unwrap().keys();
//! assert_eq!(keys, vec!["alice"]);
//! ```

pub mod document;
pub mod error;
pub mod index;
pub mod journal;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod types;

// Public re-exports for the top-level API
pub use document::{Document, FieldPath, Value};
pub use error::{Error, PathError, Result};
pub use journal::SyncPolicy;
pub use query::{Plan, Predicate, QueryResults};
pub use snapshot::SnapshotInfo;
pub use store::{Store, StoreOptions};
pub use types::{Entry, Key, Sequence};
