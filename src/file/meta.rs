//! The metadata block: one opaque JSON document.
//!
//! Wire form is a length-prefixed UTF-8 JSON byte string. The codec
//! validates JSON, not schema; the recommended (unenforced) layout is:
//!
//! ```text
//! {
//!   "image":     { "width": int, "height": int },
//!   "camera":    { "translate": [f, f, f], "rotate": [f, f, f],
//!                  "fstop": f, "focus": f },
//!   "keyframes": { "frame": int, "firstFrame": int, "lastFrame": int }
//! }
//! ```

use crate::codec;
use crate::error::{Error, Result};
use bytes::BytesMut;
use serde_json::Value;

/// The file's metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    value: Value,
}

impl Default for Metadata {
    fn default() -> Self {
        Self { value: Value::Object(serde_json::Map::new()) }
    }
}

impl Metadata {
    /// Creates an empty (`{}`) document.
    pub fn new() -> Self {
        Self::default()
    }

    /// The decoded document.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Mutable access to the document.
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Replaces the document.
    pub fn set(&mut self, value: Value) {
        self.value = value;
    }

    /// Decodes the metadata block spanning `data`.
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        let input = &mut &data[..];
        let raw = codec::get_bytes(input)?;
        if !input.is_empty() {
            return Err(Error::corrupt(format!(
                "metadata block has {} trailing bytes",
                input.len()
            )));
        }
        let value = serde_json::from_slice(&raw)
            .map_err(|e| Error::corrupt(format!("metadata is not valid JSON: {}", e)))?;
        Ok(Self { value })
    }

    /// Encodes the metadata block.
    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let raw = serde_json::to_vec(&self.value)
            .map_err(|e| Error::invalid_argument(format!("metadata not serializable: {}", e)))?;
        codec::put_bytes(buf, &raw)
    }
}
