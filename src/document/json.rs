//! Conversion between documents and `serde_json` values.

use serde_json::{Map, Number};

use crate::document::value::{Document, Value};
use crate::error::{Error, Result};

impl Document {
    /// Build a document from a JSON object literal.
    ///
    /// A top-level value that is not an object, or a number that cannot be
    /// represented as a finite `f64`, is an `Error::Type`.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from_json(json)? {
            Value::Map(doc) => Ok(doc),
            other => Err(Error::Type(format!(
                "a document must be a JSON object, got {}",
                other.kind()
            ))),
        }
    }

    /// Parse a JSON object from text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::Type(format!("invalid JSON: {e}")))?;
        Document::from_json(json)
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Map(self.clone()).to_json()
    }
}

impl Value {
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                let f = n
                    .as_f64()
                    .ok_or_else(|| Error::Type(format!("unrepresentable number {n}")))?;
                Value::number(f)?
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<_>>()?,
            ),
            serde_json::Value::Object(map) => {
                let mut doc = Document::new();
                for (field, value) in map {
                    doc.insert(field, Value::from_json(value)?);
                }
                Value::Map(doc)
            }
        })
    }

    /// Convert to JSON. Whole numbers within the `i64` range become JSON
    /// integers so `30` does not print as `30.0`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(doc) => {
                let mut map = Map::new();
                for (field, value) in doc.iter() {
                    map.insert(field.to_owned(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl TryFrom<serde_json::Value> for Document {
    type Error = Error;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        Document::from_json(json)
    }
}
