//! Self-describing binary encoding for documents.
//!
//! Every value starts with a one-byte type tag, so any encoded value can be
//! decoded on its own without a schema:
//!
//! ```text
//! 0x00 null
//! 0x01 bool    | 1B (0 or 1)
//! 0x02 number  | 8B f64 bits, little-endian
//! 0x03 string  | len (4B) | UTF-8 bytes
//! 0x04 array   | count (4B) | value*
//! 0x05 map     | count (4B) | (key len (4B) | key | value)*
//! ```
//!
//! A document is encoded as a map value.

use crate::document::value::{Document, MAX_NESTING_DEPTH, Value};
use crate::error::{Error, Result};

pub const TAG_NULL: u8 = 0x00;
pub const TAG_BOOL: u8 = 0x01;
pub const TAG_NUMBER: u8 = 0x02;
pub const TAG_STRING: u8 = 0x03;
pub const TAG_ARRAY: u8 = 0x04;
pub const TAG_MAP: u8 = 0x05;

/// Encode a document to bytes.
pub fn encode_document(doc: &Document) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_map(doc, &mut buf, false);
    buf
}

/// Decode a document previously produced by [`encode_document`].
///
/// The input must hold exactly one map value and nothing after it.
pub fn decode_document(data: &[u8]) -> Result<Document> {
    let mut reader = ByteReader::new(data);
    let value = decode_value_at(&mut reader, 0)?;
    reader.finish()?;
    match value {
        Value::Map(doc) => Ok(doc),
        other => Err(Error::Format(format!(
            "expected a map at document root, found {}",
            other.kind()
        ))),
    }
}

/// Append the encoding of a single value to `buf`.
pub fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    encode_value_inner(value, buf, false);
}

/// Decode a single value, rejecting trailing bytes.
pub fn decode_value(data: &[u8]) -> Result<Value> {
    let mut reader = ByteReader::new(data);
    let value = decode_value_at(&mut reader, 0)?;
    reader.finish()?;
    Ok(value)
}

/// Hash key for secondary indexes.
///
/// Same layout as [`encode_value`] but with map fields sorted by name and
/// `-0.0` folded into `0.0`, so values that compare equal produce identical
/// bytes. The type tag leads, so `"30"` and `30` never share a key.
pub fn canonical_key(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_inner(value, &mut buf, true);
    buf
}

fn encode_value_inner(value: &Value, buf: &mut Vec<u8>, canonical: bool) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Number(n) => {
            buf.push(TAG_NUMBER);
            let n = if canonical && *n == 0.0 { 0.0 } else { *n };
            buf.extend_from_slice(&n.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            put_bytes(buf, s.as_bytes());
        }
        Value::Array(items) => {
            buf.push(TAG_ARRAY);
            buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_value_inner(item, buf, canonical);
            }
        }
        Value::Map(doc) => encode_map(doc, buf, canonical),
    }
}

fn encode_map(doc: &Document, buf: &mut Vec<u8>, canonical: bool) {
    buf.push(TAG_MAP);
    buf.extend_from_slice(&(doc.len() as u32).to_le_bytes());

    let mut fields: Vec<(&str, &Value)> = doc.iter().collect();
    if canonical {
        fields.sort_by(|a, b| a.0.cmp(b.0));
    }
    for (field, value) in fields {
        put_bytes(buf, field.as_bytes());
        encode_value_inner(value, buf, canonical);
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn decode_value_at(reader: &mut ByteReader<'_>, depth: usize) -> Result<Value> {
    let tag = reader.u8()?;
    if matches!(tag, TAG_ARRAY | TAG_MAP) && depth >= MAX_NESTING_DEPTH {
        return Err(Error::Format(format!(
            "nesting deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }

    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_BOOL => match reader.u8()? {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            b => Err(Error::Format(format!("invalid bool byte {b:#04x}"))),
        },
        TAG_NUMBER => {
            let n = f64::from_bits(reader.u64()?);
            if !n.is_finite() {
                return Err(Error::Format(format!("non-finite number {n}")));
            }
            Ok(Value::Number(n))
        }
        TAG_STRING => Ok(Value::String(reader.string()?)),
        TAG_ARRAY => {
            let count = reader.u32()? as usize;
            // Each element needs at least its tag byte.
            if count > reader.remaining() {
                return Err(Error::Format(format!("array count {count} exceeds data")));
            }
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value_at(reader, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        TAG_MAP => {
            let count = reader.u32()? as usize;
            if count > reader.remaining() {
                return Err(Error::Format(format!("map count {count} exceeds data")));
            }
            let mut doc = Document::new();
            for _ in 0..count {
                let field = reader.string()?;
                let value = decode_value_at(reader, depth + 1)?;
                if doc.insert(field.clone(), value).is_some() {
                    return Err(Error::Format(format!("duplicate field {field:?}")));
                }
            }
            Ok(Value::Map(doc))
        }
        other => Err(Error::Format(format!("unknown type tag {other:#04x}"))),
    }
}

/// Bounds-checked little-endian reader over a byte slice.
///
/// Every short read is a `Format` error; shared by the snapshot and journal
/// decoders.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteReader { data, offset: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Format(format!(
                "truncated: need {n} bytes at offset {}, have {}",
                self.offset,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::Format(format!("invalid UTF-8: {e}")))
    }

    /// Fail unless every byte has been consumed.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::Format(format!(
                "{} trailing bytes at offset {}",
                self.remaining(),
                self.offset
            )));
        }
        Ok(())
    }
}
