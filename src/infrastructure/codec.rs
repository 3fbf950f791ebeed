//! JSON document codec.

use crate::application::ports::{DecodeError, DocumentCodec};
use crate::domain::document::Document;

/// Decodes documents from UTF-8 JSON using `serde_json`.
///
/// Missing required fields, wrong types and trailing garbage all fail with
/// `DecodeError::Malformed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentCodec for JsonCodec {
    fn decode(&self, payload: &[u8]) -> Result<Document, DecodeError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text)?)
    }
}
