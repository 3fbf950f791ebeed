//! Codec doubles.

use crate::application::ports::{DecodeError, DocumentCodec};
use crate::domain::document::Document;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a codec and counts how often it was invoked.
#[derive(Debug, Clone)]
pub struct CountingCodec<C> {
    inner: C,
    calls: Arc<AtomicUsize>,
}

impl<C: DocumentCodec> CountingCodec<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `decode` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: DocumentCodec> DocumentCodec for CountingCodec<C> {
    fn decode(&self, payload: &[u8]) -> Result<Document, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(payload)
    }
}

/// A complete, valid JSON document with one product.
pub fn sample_payload() -> String {
    r#"{
        "description": { "participantInn": "7700000000" },
        "doc_id": "doc-1",
        "doc_status": "NEW",
        "doc_type": "LP_INTRODUCE_GOODS",
        "importRequest": true,
        "owner_inn": "7700000001",
        "participant_inn": "7700000000",
        "producer_inn": "7700000002",
        "production_date": "2020-01-23",
        "production_type": "OWN_PRODUCTION",
        "products": [
            {
                "certificate_document": "CONFORMITY_CERTIFICATE",
                "certificate_document_date": "2020-01-23",
                "certificate_document_number": "cert-1",
                "owner_inn": "7700000001",
                "producer_inn": "7700000002",
                "production_date": "2020-01-23",
                "tnved_code": "6401",
                "uit_code": "uit-1",
                "uitu_code": "uitu-1"
            }
        ],
        "reg_date": "2020-01-23",
        "reg_number": "reg-1"
    }"#
    .to_string()
}
