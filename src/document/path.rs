use std::fmt;
use std::str::FromStr;

use crate::document::value::{Document, Value};
use crate::error::PathError;

/// A dotted path into a document, e.g. `address.city` or `tags.0`.
///
/// Segments are resolved against whatever container they meet: a map looks
/// the segment up as a field name (even when it is numeric), an array parses
/// it as an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(PathError::Invalid(path.to_owned()));
        }
        Ok(FieldPath {
            segments: path.split('.').map(str::to_owned).collect(),
        })
    }

    /// Reject a path built through the unchecked `From<&str>` conversion
    /// that `parse` would not have accepted.
    pub fn check(&self) -> Result<(), PathError> {
        if self.segments.is_empty() || self.segments.iter().any(String::is_empty) {
            return Err(PathError::Invalid(self.to_string()));
        }
        Ok(())
    }

    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        FieldPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn prefix(&self, n: usize) -> String {
        self.segments[..n].join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

/// Unchecked conversion for predicate builders. Malformed paths are kept
/// as written and rejected by [`FieldPath::check`] when a query runs.
impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        FieldPath {
            segments: s.split('.').map(str::to_owned).collect(),
        }
    }
}

impl Document {
    /// Resolve a path to the value it addresses.
    pub fn resolve(&self, path: &FieldPath) -> Result<&Value, PathError> {
        let Some((first, rest)) = path.segments.split_first() else {
            return Err(PathError::Invalid(String::new()));
        };
        let mut current = self.get(first).ok_or_else(|| PathError::MissingField {
            at: String::new(),
            field: first.clone(),
        })?;

        for (i, segment) in rest.iter().enumerate() {
            // prefix strings are built only on the error paths
            let at = || path.prefix(i + 1);
            current = match current {
                Value::Map(doc) => doc.get(segment).ok_or_else(|| PathError::MissingField {
                    at: at(),
                    field: segment.clone(),
                })?,
                Value::Array(items) => {
                    let index: usize = segment.parse().map_err(|_| PathError::NotAnIndex {
                        at: at(),
                        segment: segment.clone(),
                    })?;
                    items.get(index).ok_or_else(|| PathError::IndexOutOfBounds {
                        at: at(),
                        index,
                        len: items.len(),
                    })?
                }
                scalar => {
                    return Err(PathError::NotIndexable {
                        at: at(),
                        kind: scalar.kind(),
                    });
                }
            };
        }
        Ok(current)
    }
}
