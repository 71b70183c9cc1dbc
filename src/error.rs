use std::io;

use thiserror::Error;

/// Why a field path could not be resolved against a document.
///
/// During query evaluation these are treated as "no match" rather than
/// propagated, so one oddly shaped document cannot abort a scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path string was empty or contained an empty segment.
    #[error("invalid field path {0:?}")]
    Invalid(String),
    /// A map along the path has no field with this name.
    #[error("missing field {field:?} at {at:?}")]
    MissingField { at: String, field: String },
    /// The path tried to descend into a scalar.
    #[error("cannot descend into a {kind} at {at:?}")]
    NotIndexable { at: String, kind: &'static str },
    /// An array index past the end of the array.
    #[error("index {index} out of bounds (len {len}) at {at:?}")]
    IndexOutOfBounds { at: String, index: usize, len: usize },
    /// A non-numeric segment applied to an array.
    #[error("segment {segment:?} is not an array index at {at:?}")]
    NotAnIndex { at: String, segment: String },
}

/// Unified error type for the document store.
#[derive(Debug, Error)]
pub enum Error {
    /// No live document under this key (or no such secondary index).
    #[error("not found: {0}")]
    NotFound(String),
    /// `insert` on a key that already holds a document.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    /// Keys must be non-empty and fit a u32 length prefix.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// A value of an unsupported kind (non-finite number, non-object document).
    #[error("type error: {0}")]
    Type(String),
    /// A document that violates a structural limit.
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Path(#[from] PathError),
    /// A conditional update saw a newer sequence than the caller expected.
    #[error("sequence mismatch on {key}: expected {expected}, found {actual}")]
    SequenceMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },
    /// The operation needs something this store was not opened with.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// Corrupt or version-mismatched snapshot, journal or document bytes.
    #[error("format error: {0}")]
    Format(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias used throughout the store.
pub type Result<T> = std::result::Result<T, Error>;
