//! The document model: values, field paths and the binary codec.

pub mod codec;
pub mod json;
pub mod path;
pub mod value;

pub use path::FieldPath;
pub use value::{Document, MAX_NESTING_DEPTH, Value};
