//! Per-window request counter.
//!
//! The counter is a diagnostic signal next to the permit pool: it counts
//! admissions in the current window and flags the ones that go past the
//! configured capacity. It never blocks anything on its own.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Result of recording one admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountObservation {
    /// The window is still within its limit
    WithinLimit {
        /// Admissions in this window, including this one
        count: usize,
    },
    /// The window has admitted more than its limit
    OverLimit {
        /// Admissions in this window, including this one
        count: usize,
        /// Configured limit
        limit: usize,
    },
}

impl CountObservation {
    /// Check if this observation is over the limit.
    pub fn is_over_limit(&self) -> bool {
        matches!(self, CountObservation::OverLimit { .. })
    }

    /// Window count at the time of the observation.
    pub fn count(&self) -> usize {
        match self {
            CountObservation::WithinLimit { count } | CountObservation::OverLimit { count, .. } => {
                *count
            }
        }
    }
}

/// Atomic admission counter, zeroed once per window.
///
/// # Example
/// ```
/// use admission_gate::RequestCounter;
///
/// let counter = RequestCounter::new(2);
/// assert!(!counter.record().is_over_limit());
/// assert!(!counter.record().is_over_limit());
/// assert!(counter.record().is_over_limit());
///
/// assert_eq!(counter.reset(), 3);
/// assert_eq!(counter.count(), 0);
/// ```
#[derive(Debug)]
pub struct RequestCounter {
    limit: usize,
    count: AtomicUsize,
    resets: AtomicU64,
}

impl RequestCounter {
    /// Create a counter flagging windows with more than `limit` admissions.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            count: AtomicUsize::new(0),
            resets: AtomicU64::new(0),
        }
    }

    /// Record one admission.
    pub fn record(&self) -> CountObservation {
        let count = self.count.fetch_add(1, Ordering::AcqRel).saturating_add(1);

        if count > self.limit {
            CountObservation::OverLimit {
                count,
                limit: self.limit,
            }
        } else {
            CountObservation::WithinLimit { count }
        }
    }

    /// Zero the counter, returning the count of the window that just ended.
    pub fn reset(&self) -> usize {
        let previous = self.count.swap(0, Ordering::AcqRel);
        self.resets.fetch_add(1, Ordering::Relaxed);
        previous
    }

    /// Admissions recorded in the current window.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of resets performed.
    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }
}
