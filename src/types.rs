use std::sync::Arc;

use crate::document::Document;
use crate::error::{Error, Result};

/// Document key. Opaque, non-empty, unique within a store.
pub type Key = String;

/// Position in the global mutation order.
///
/// Starts at 0 for an empty store; each mutation takes the next value, so a
/// key's entry sequence always increases when the key is rewritten.
pub type Sequence = u64;

/// A live document together with the sequence of its latest mutation.
///
/// The document is shared so that scans and query results can hold a
/// point-in-time view without deep-copying every document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub document: Arc<Document>,
    pub sequence: Sequence,
}

/// Reject keys that cannot be stored or encoded.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key must not be empty".into()));
    }
    if key.len() > u32::MAX as usize {
        return Err(Error::InvalidKey(format!(
            "key of {} bytes exceeds the u32 length prefix",
            key.len()
        )));
    }
    Ok(())
}
