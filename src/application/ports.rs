//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports: `JsonCodec` and
//! `FileSink` for production use, and the sinks in
//! `crate::infrastructure::mocks` for tests.

use crate::domain::document::Document;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

/// Error returned when a payload cannot be turned into a [`Document`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not valid UTF-8
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Payload is not a well-formed document
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Error returned when a sink fails to record a document.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Underlying I/O failed
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// Sink refused the document
    #[error("sink rejected document: {0}")]
    Rejected(String),
}

/// Acknowledgement returned by a sink for a recorded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Where the document was recorded
    pub location: PathBuf,
}

impl Ack {
    /// Create an acknowledgement for the given location.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// Port for decoding raw payloads.
///
/// Decoding is CPU-bound and runs on the submitting task while its permit is
/// held.
pub trait DocumentCodec: Send + Sync + Debug {
    /// Decode a raw payload into a document.
    ///
    /// # Errors
    /// Returns `DecodeError` if the payload is not a valid document.
    fn decode(&self, payload: &[u8]) -> Result<Document, DecodeError>;
}

/// Port for durably recording admitted documents.
///
/// The gate never retries a failed `persist`; the error is handed back to
/// the submitter.
#[async_trait]
pub trait DocumentSink: Send + Sync + Debug {
    /// Record `document` together with the submitter's `signature`.
    ///
    /// # Errors
    /// Returns `PersistError` if the document could not be recorded.
    async fn persist(&self, document: &Document, signature: &str) -> Result<Ack, PersistError>;
}

#[async_trait]
impl<T> DocumentSink for std::sync::Arc<T>
where
    T: DocumentSink + ?Sized,
{
    async fn persist(&self, document: &Document, signature: &str) -> Result<Ack, PersistError> {
        (**self).persist(document, signature).await
    }
}

impl<T> DocumentCodec for std::sync::Arc<T>
where
    T: DocumentCodec + ?Sized,
{
    fn decode(&self, payload: &[u8]) -> Result<Document, DecodeError> {
        (**self).decode(payload)
    }
}
