//! Observability metrics for the admission gate.
//!
//! Provides counters about admission outcomes for monitoring and debugging.

use crate::domain::request::RequestState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking admission statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct GateMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Requests that obtained a permit
    admitted: AtomicU64,
    /// Requests acknowledged by the sink
    persisted: AtomicU64,
    /// Requests whose payload failed to decode
    decode_failed: AtomicU64,
    /// Requests the sink failed to record
    persist_failed: AtomicU64,
    /// Requests refused because the window was over its limit
    rejected: AtomicU64,
    /// Requests cancelled while waiting for a permit
    cancelled: AtomicU64,
    /// Admissions observed past the window limit
    over_limit: AtomicU64,
    /// Completed reset ticks
    resets: AtomicU64,
    /// Permits restored by resets
    permits_reclaimed: AtomicU64,
}

impl GateMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.admitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request reaching a terminal state.
    pub(crate) fn record_outcome(&self, state: RequestState) {
        let counter = match state {
            RequestState::Persisted => &self.inner.persisted,
            RequestState::DecodeFailed => &self.inner.decode_failed,
            RequestState::PersistFailed => &self.inner.persist_failed,
            RequestState::Rejected => &self.inner.rejected,
            RequestState::Cancelled => &self.inner.cancelled,
            RequestState::Pending | RequestState::Admitted | RequestState::Decoded => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_over_limit(&self) {
        self.inner.over_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reset(&self, reclaimed: usize) {
        self.inner.resets.fetch_add(1, Ordering::Relaxed);
        self.inner
            .permits_reclaimed
            .fetch_add(reclaimed as u64, Ordering::Relaxed);
    }

    /// Get the total number of admitted requests.
    pub fn admitted(&self) -> u64 {
        self.inner.admitted.load(Ordering::Relaxed)
    }

    /// Get the total number of persisted requests.
    pub fn persisted(&self) -> u64 {
        self.inner.persisted.load(Ordering::Relaxed)
    }

    /// Get the total number of decode failures.
    pub fn decode_failed(&self) -> u64 {
        self.inner.decode_failed.load(Ordering::Relaxed)
    }

    /// Get the total number of persist failures.
    pub fn persist_failed(&self) -> u64 {
        self.inner.persist_failed.load(Ordering::Relaxed)
    }

    /// Get the total number of over-limit rejections.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    /// Get the total number of cancelled acquisitions.
    pub fn cancelled(&self) -> u64 {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Get the total number of over-limit observations.
    pub fn over_limit(&self) -> u64 {
        self.inner.over_limit.load(Ordering::Relaxed)
    }

    /// Get the total number of reset ticks.
    pub fn resets(&self) -> u64 {
        self.inner.resets.load(Ordering::Relaxed)
    }

    /// Get the total number of permits restored by resets.
    pub fn permits_reclaimed(&self) -> u64 {
        self.inner.permits_reclaimed.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted(),
            persisted: self.persisted(),
            decode_failed: self.decode_failed(),
            persist_failed: self.persist_failed(),
            rejected: self.rejected(),
            cancelled: self.cancelled(),
            over_limit: self.over_limit(),
            resets: self.resets(),
            permits_reclaimed: self.permits_reclaimed(),
        }
    }
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Requests that obtained a permit
    pub admitted: u64,
    /// Requests acknowledged by the sink
    pub persisted: u64,
    /// Requests whose payload failed to decode
    pub decode_failed: u64,
    /// Requests the sink failed to record
    pub persist_failed: u64,
    /// Requests refused because the window was over its limit
    pub rejected: u64,
    /// Requests cancelled while waiting for a permit
    pub cancelled: u64,
    /// Admissions observed past the window limit
    pub over_limit: u64,
    /// Completed reset ticks
    pub resets: u64,
    /// Permits restored by resets
    pub permits_reclaimed: u64,
}

impl MetricsSnapshot {
    /// Admitted requests that reached a terminal state.
    pub fn completed(&self) -> u64 {
        self.persisted
            .saturating_add(self.decode_failed)
            .saturating_add(self.persist_failed)
            .saturating_add(self.rejected)
    }

    /// Admitted requests still holding a permit at snapshot time.
    pub fn in_flight(&self) -> u64 {
        self.admitted.saturating_sub(self.completed())
    }

    /// Calculate the failure rate of completed requests (0.0 to 1.0).
    ///
    /// Returns 0.0 if nothing has completed.
    pub fn failure_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.0
        } else {
            (completed - self.persisted) as f64 / completed as f64
        }
    }
}
