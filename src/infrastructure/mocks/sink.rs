//! Sink doubles.

use crate::application::ports::{Ack, DocumentSink, PersistError};
use crate::domain::document::Document;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A document recorded by [`RecordingSink`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PersistedRecord {
    pub doc_id: String,
    pub signature: String,
    pub started_at: Instant,
    pub completed_at: Instant,
}

type FailurePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// In-memory sink that records every call.
///
/// Optionally sleeps for a fixed latency and fails calls whose signature
/// matches a predicate. Clones share the same records.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<PersistedRecord>>>,
    latency: Duration,
    fail_when: Option<FailurePredicate>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl RecordingSink {
    /// Create a sink that acknowledges immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail calls whose signature matches `predicate`.
    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Arc::new(predicate));
        self
    }

    /// Successfully recorded documents in completion order.
    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    /// Number of successfully recorded documents.
    pub fn count(&self) -> usize {
        self.records
            .lock()
            .expect("RecordingSink mutex poisoned - a test thread panicked while holding the lock")
            .len()
    }

    /// Highest number of `persist` calls that overlapped.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSink")
            .field("count", &self.count())
            .field("latency", &self.latency)
            .field("fails", &self.fail_when.is_some())
            .finish()
    }
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn persist(&self, document: &Document, signature: &str) -> Result<Ack, PersistError> {
        let started_at = Instant::now();
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_when.as_ref().is_some_and(|fails| fails(signature)) {
            return Err(PersistError::Rejected(format!(
                "refused signature {signature}"
            )));
        }

        let mut records = self
            .records
            .lock()
            .expect("RecordingSink mutex poisoned - a test thread panicked while holding the lock");
        records.push(PersistedRecord {
            doc_id: document.doc_id.clone(),
            signature: signature.to_string(),
            started_at,
            completed_at: Instant::now(),
        });
        Ok(Ack::new(format!("memory://{}", records.len())))
    }
}

/// Sink that fails every call with the same reason.
#[derive(Debug, Clone)]
pub struct FailingSink {
    reason: String,
    calls: Arc<AtomicUsize>,
}

impl FailingSink {
    /// Create a sink failing with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `persist` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSink for FailingSink {
    async fn persist(&self, _document: &Document, _signature: &str) -> Result<Ack, PersistError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PersistError::Rejected(self.reason.clone()))
    }
}
