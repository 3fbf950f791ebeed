//! Admission gate coordination logic.
//!
//! The gate admits a submission once it holds a permit, runs the codec and
//! the sink while holding it, and resolves the permit on every exit path.
//! Concurrency is bounded by the permit pool alone; nothing else serializes
//! submissions.

use crate::application::counter::{CountObservation, RequestCounter};
use crate::application::metrics::GateMetrics;
use crate::application::permit_pool::{AcquireError, Permit, PermitPool};
use crate::application::ports::{Ack, DecodeError, DocumentCodec, DocumentSink, PersistError};
use crate::application::scheduler::{
    ResetScheduler, SchedulerConfig, SchedulerHandle, SchedulerMonitor, SchedulerState,
    ShutdownError,
};
use crate::domain::config::{
    ConfigError, GateConfig, IntervalUnit, MissedTicks, OverLimitAction, WindowMode,
};
use crate::domain::request::RequestState;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Error returned by gate construction and submissions.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Capacity or interval out of range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// The gate was built outside a Tokio runtime
    #[error("admission gate must be built inside a Tokio runtime")]
    NoRuntime,
    /// Cancelled while waiting for a permit; no permit is held
    #[error("operation cancelled while waiting for a permit")]
    OperationCancelled,
    /// The gate was shut down before a permit was granted
    #[error("admission gate is shut down")]
    Closed,
    /// The window already admitted its limit
    #[error("request limit of {limit} exceeded in the current window")]
    LimitExceeded {
        /// Configured limit
        limit: usize,
    },
    /// The payload could not be decoded
    #[error("document rejected: {0}")]
    Decode(#[from] DecodeError),
    /// The sink failed to record the document
    #[error("document not persisted: {0}")]
    Persist(#[from] PersistError),
}

impl GateError {
    /// Terminal request state this error corresponds to, if any.
    pub fn request_state(&self) -> Option<RequestState> {
        match self {
            GateError::OperationCancelled | GateError::Closed => Some(RequestState::Cancelled),
            GateError::LimitExceeded { .. } => Some(RequestState::Rejected),
            GateError::Decode(_) => Some(RequestState::DecodeFailed),
            GateError::Persist(_) => Some(RequestState::PersistFailed),
            GateError::InvalidConfiguration(_) | GateError::NoRuntime => None,
        }
    }
}

/// Builder for constructing an [`AdmissionGate`].
#[derive(Debug)]
pub struct AdmissionGateBuilder<C, S> {
    capacity: usize,
    interval: Duration,
    window_mode: WindowMode,
    over_limit: OverLimitAction,
    missed_ticks: MissedTicks,
    codec: C,
    sink: S,
}

impl<C, S> AdmissionGateBuilder<C, S>
where
    C: DocumentCodec,
    S: DocumentSink,
{
    /// Set the number of permits per window.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the window length.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the window length to one `unit`.
    pub fn with_interval_unit(mut self, unit: IntervalUnit) -> Self {
        self.interval = unit.as_duration();
        self
    }

    /// Set what happens to permits of requests that reached the sink.
    ///
    /// Default: [`WindowMode::Quota`]
    pub fn with_window_mode(mut self, mode: WindowMode) -> Self {
        self.window_mode = mode;
        self
    }

    /// Set the reaction to admissions past the window limit.
    ///
    /// Default: [`OverLimitAction::Report`]
    pub fn with_over_limit_action(mut self, action: OverLimitAction) -> Self {
        self.over_limit = action;
        self
    }

    /// Set the reset timer's missed-tick behaviour.
    ///
    /// Default: [`MissedTicks::Skip`]
    pub fn with_missed_ticks(mut self, missed_ticks: MissedTicks) -> Self {
        self.missed_ticks = missed_ticks;
        self
    }

    /// Take every setting from an already validated config.
    pub fn with_config(mut self, config: &GateConfig) -> Self {
        self.capacity = config.capacity();
        self.interval = config.interval();
        self.window_mode = config.window_mode();
        self.over_limit = config.over_limit_action();
        self.missed_ticks = config.missed_ticks();
        self
    }

    /// Build the gate and start its reset task.
    ///
    /// # Errors
    /// Returns `GateError::InvalidConfiguration` if capacity or interval is
    /// zero, and `GateError::NoRuntime` outside a Tokio runtime.
    pub fn build(self) -> Result<AdmissionGate<C, S>, GateError> {
        let config = GateConfig::new(self.capacity, self.interval)?
            .with_window_mode(self.window_mode)
            .with_over_limit_action(self.over_limit)
            .with_missed_ticks(self.missed_ticks);

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(GateError::NoRuntime);
        }

        let pool = Arc::new(PermitPool::new(config.capacity()));
        let counter = Arc::new(RequestCounter::new(config.capacity()));
        let metrics = GateMetrics::new();

        let scheduler_config =
            SchedulerConfig::new(config.interval())?.with_missed_ticks(config.missed_ticks());
        let handle =
            ResetScheduler::new(&pool, &counter, metrics.clone(), scheduler_config).start();
        let monitor = handle.monitor();

        tracing::debug!(
            capacity = config.capacity(),
            interval = ?config.interval(),
            window_mode = ?config.window_mode(),
            "admission gate started"
        );

        Ok(AdmissionGate {
            config,
            pool,
            counter,
            metrics,
            codec: self.codec,
            sink: self.sink,
            scheduler: Mutex::new(Some(handle)),
            monitor,
        })
    }
}

/// Fixed-window admission control for document submissions.
///
/// # Example
///
/// ```no_run
/// use admission_gate::{AdmissionGate, FileSink, IntervalUnit, JsonCodec};
///
/// # async fn example(payload: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let gate = AdmissionGate::builder(JsonCodec::new(), FileSink::new("out"))
///     .with_capacity(5)
///     .with_interval_unit(IntervalUnit::Seconds)
///     .build()?;
///
/// let ack = gate.submit(payload, "signature").await?;
/// println!("written to {}", ack.location.display());
///
/// gate.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AdmissionGate<C, S> {
    config: GateConfig,
    pool: Arc<PermitPool>,
    counter: Arc<RequestCounter>,
    metrics: GateMetrics,
    codec: C,
    sink: S,
    scheduler: Mutex<Option<SchedulerHandle>>,
    monitor: SchedulerMonitor,
}

impl<C, S> AdmissionGate<C, S>
where
    C: DocumentCodec,
    S: DocumentSink,
{
    /// Create a builder for configuring the gate.
    ///
    /// Defaults:
    /// - Capacity: 10 permits
    /// - Interval: 1 second
    /// - Window mode: quota
    /// - Over-limit action: report
    /// - Missed ticks: skip
    pub fn builder(codec: C, sink: S) -> AdmissionGateBuilder<C, S> {
        AdmissionGateBuilder {
            capacity: 10,
            interval: Duration::from_secs(1),
            window_mode: WindowMode::default(),
            over_limit: OverLimitAction::default(),
            missed_ticks: MissedTicks::default(),
            codec,
            sink,
        }
    }

    /// Create a gate from a validated config and start its reset task.
    ///
    /// # Errors
    /// Returns `GateError::NoRuntime` outside a Tokio runtime.
    pub fn new(config: &GateConfig, codec: C, sink: S) -> Result<Self, GateError> {
        Self::builder(codec, sink).with_config(config).build()
    }

    /// Create a gate admitting `request_limit` submissions per `unit`.
    ///
    /// # Errors
    /// Returns `GateError::InvalidConfiguration` if `request_limit` is zero
    /// and `GateError::NoRuntime` outside a Tokio runtime.
    pub fn per_unit(
        unit: IntervalUnit,
        request_limit: usize,
        codec: C,
        sink: S,
    ) -> Result<Self, GateError> {
        Self::builder(codec, sink)
            .with_capacity(request_limit)
            .with_interval_unit(unit)
            .build()
    }

    /// Wait for admission.
    ///
    /// The returned permit counts as one admission in the current window.
    /// The caller performs its own work and resolves the permit.
    ///
    /// # Errors
    /// Returns `GateError::Closed` after shutdown and
    /// `GateError::LimitExceeded` if the window is over its limit and
    /// `OverLimitAction::Reject` is configured.
    pub async fn acquire(&self) -> Result<Permit, GateError> {
        self.admit(std::future::pending::<()>()).await
    }

    /// Wait for admission unless `cancel` resolves first.
    ///
    /// # Errors
    /// As [`acquire`](Self::acquire), plus `GateError::OperationCancelled`.
    pub async fn acquire_until<F>(&self, cancel: F) -> Result<Permit, GateError>
    where
        F: Future,
    {
        self.admit(cancel).await
    }

    /// Submit a payload for decoding and persistence.
    ///
    /// Waits for a permit, then decodes `payload` and hands the document and
    /// `signature` to the sink while holding the permit.
    ///
    /// # Errors
    /// Returns `GateError::Decode` or `GateError::Persist` for failures of
    /// the codec or the sink, and the admission errors of
    /// [`acquire`](Self::acquire).
    pub async fn submit(&self, payload: &[u8], signature: &str) -> Result<Ack, GateError> {
        self.submit_with_cancel(payload, signature, std::future::pending::<()>())
            .await
    }

    /// Submit a payload, giving up if `cancel` resolves before admission.
    ///
    /// Once admitted the submission runs to completion; `cancel` is only
    /// raced against the wait for a permit. A cancelled submission never
    /// reaches the codec or the sink.
    ///
    /// # Errors
    /// As [`submit`](Self::submit), plus `GateError::OperationCancelled`.
    pub async fn submit_with_cancel<F>(
        &self,
        payload: &[u8],
        signature: &str,
        cancel: F,
    ) -> Result<Ack, GateError>
    where
        F: Future,
    {
        let mut permit = self.admit(cancel).await?;

        let document = match self.codec.decode(payload) {
            Ok(document) => {
                // From here on the window's slot is used even if the caller
                // drops this future before the sink answers.
                if self.config.window_mode() == WindowMode::Quota {
                    permit.retire_on_drop();
                }
                document
            }
            Err(err) => {
                permit.release();
                self.metrics.record_outcome(RequestState::DecodeFailed);
                tracing::warn!(error = %err, "document rejected");
                return Err(err.into());
            }
        };
        tracing::trace!(state = %RequestState::Decoded, doc_id = %document.doc_id);

        let result = self.sink.persist(&document, signature).await;
        self.resolve_spent(permit);

        match result {
            Ok(ack) => {
                self.metrics.record_outcome(RequestState::Persisted);
                tracing::trace!(
                    state = %RequestState::Persisted,
                    artifact = %ack.location.display()
                );
                Ok(ack)
            }
            Err(err) => {
                self.metrics.record_outcome(RequestState::PersistFailed);
                tracing::warn!(error = %err, doc_id = %document.doc_id, "document not persisted");
                Err(err.into())
            }
        }
    }

    /// Close the gate and stop the reset task.
    ///
    /// Submissions already holding a permit run to completion. Submissions
    /// still waiting, and any made afterwards, fail with `GateError::Closed`.
    /// Calling this again is a no-op.
    ///
    /// # Errors
    /// Returns `ShutdownError` if the reset task panicked.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        // Take the handle while holding the lock, then release the lock before awaiting
        let handle = {
            let mut handle_guard = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
            handle_guard.take()
        };

        // Closed before waiting on the task, so waiters are released even if
        // this future is dropped mid-shutdown
        self.pool.close();

        let Some(handle) = handle else {
            return Ok(());
        };

        let stopped = handle.shutdown().await;
        tracing::debug!(resets = self.metrics.resets(), "admission gate shut down");
        stopped
    }

    /// Get the gate configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &GateMetrics {
        &self.metrics
    }

    /// Permits available right now.
    pub fn available_permits(&self) -> usize {
        self.pool.available()
    }

    /// Admissions recorded in the current window.
    pub fn window_count(&self) -> usize {
        self.counter.count()
    }

    /// Snapshot of the reset task.
    pub fn scheduler_state(&self) -> SchedulerState {
        self.monitor.state()
    }

    /// Get a reference to the codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Get a reference to the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    async fn admit<F>(&self, cancel: F) -> Result<Permit, GateError>
    where
        F: Future,
    {
        let permit = match self.pool.acquire_until(cancel).await {
            Ok(permit) => permit,
            Err(AcquireError::Cancelled) => {
                self.metrics.record_outcome(RequestState::Cancelled);
                tracing::debug!("admission cancelled while waiting for a permit");
                return Err(GateError::OperationCancelled);
            }
            Err(AcquireError::Closed) => return Err(GateError::Closed),
        };
        self.metrics.record_admitted();

        match self.counter.record() {
            CountObservation::WithinLimit { count } => {
                tracing::trace!(state = %RequestState::Admitted, count);
            }
            CountObservation::OverLimit { count, limit } => {
                self.metrics.record_over_limit();
                tracing::warn!(count, limit, "request limit exceeded");

                if self.config.over_limit_action() == OverLimitAction::Reject {
                    permit.release();
                    self.metrics.record_outcome(RequestState::Rejected);
                    return Err(GateError::LimitExceeded { limit });
                }
            }
        }

        Ok(permit)
    }

    /// Resolve the permit of a request that reached the sink.
    fn resolve_spent(&self, permit: Permit) {
        match self.config.window_mode() {
            WindowMode::Quota => permit.retire(),
            WindowMode::Concurrency => {
                permit.release();
            }
        }
    }
}
