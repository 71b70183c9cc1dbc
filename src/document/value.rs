use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::document::path::FieldPath;
use crate::error::{Error, Result};

/// Maximum nesting depth of a document (the top-level map counts as 1).
pub const MAX_NESTING_DEPTH: usize = 100;

/// A schema-free document value.
///
/// Equality is structural. Maps compare as maps (field order is ignored),
/// arrays compare element by element, and `-0.0 == 0.0`. Different variants
/// are never equal, so the string `"30"` is not the number `30`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Always finite once a document has been validated.
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(Document),
}

impl Value {
    /// Build a number, rejecting NaN and infinities.
    pub fn number(n: f64) -> Result<Self> {
        if n.is_finite() {
            Ok(Value::Number(n))
        } else {
            Err(Error::Type(format!("non-finite number {n}")))
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Document> {
        match self {
            Value::Map(doc) => Some(doc),
            _ => None,
        }
    }

    /// Ordering between two values of the same orderable kind.
    ///
    /// Only number/number and string/string pairs are ordered; every other
    /// pairing returns `None` and never satisfies a range predicate.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Nesting depth: 0 for scalars, 1 + deepest child for containers.
    pub fn depth(&self) -> usize {
        match self {
            Value::Array(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Value::Map(doc) => doc.depth(),
            _ => 0,
        }
    }

    fn check(&self) -> Result<()> {
        match self {
            Value::Number(n) if !n.is_finite() => {
                Err(Error::Type(format!("non-finite number {n}")))
            }
            Value::Array(items) => items.iter().try_for_each(Value::check),
            Value::Map(doc) => doc.values().try_for_each(Value::check),
            _ => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Map(doc)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// An insertion-ordered map from field names to values.
///
/// Documents are the unit of storage. Identity lives outside the document,
/// in the key it is stored under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set a field, returning the previous value. A new field goes last;
    /// an existing field keeps its position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Remove a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn depth(&self) -> usize {
        1 + self.fields.values().map(Value::depth).max().unwrap_or(0)
    }

    /// Check that the document can be stored: every number finite
    /// (`Error::Type`) and nesting within [`MAX_NESTING_DEPTH`]
    /// (`Error::Validation`).
    pub fn validate(&self) -> Result<()> {
        self.fields.values().try_for_each(Value::check)?;
        let depth = self.depth();
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::Validation(format!(
                "nesting depth {depth} exceeds maximum of {MAX_NESTING_DEPTH}"
            )));
        }
        Ok(())
    }

    /// Depth-first traversal of every nested value with its path, in field
    /// insertion order and array index order.
    pub fn walk(&self) -> Vec<(FieldPath, &Value)> {
        let mut out = Vec::new();
        walk_map(self, &mut Vec::new(), &mut out);
        out
    }
}

fn walk_map<'a>(doc: &'a Document, prefix: &mut Vec<String>, out: &mut Vec<(FieldPath, &'a Value)>) {
    for (field, value) in &doc.fields {
        prefix.push(field.clone());
        walk_value(value, prefix, out);
        prefix.pop();
    }
}

fn walk_value<'a>(value: &'a Value, prefix: &mut Vec<String>, out: &mut Vec<(FieldPath, &'a Value)>) {
    out.push((FieldPath::from_segments(prefix.clone()), value));
    match value {
        Value::Map(doc) => walk_map(doc, prefix, out),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                prefix.push(i.to_string());
                walk_value(item, prefix, out);
                prefix.pop();
            }
        }
        _ => {}
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
