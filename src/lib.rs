//! # admission-gate
//!
//! Fixed-window admission control for concurrent document submissions.
//!
//! An [`AdmissionGate`] lets at most `capacity` submissions proceed per
//! window. Each submission waits for a permit, decodes its payload into a
//! [`Document`] and hands it to a sink. A background task starts a new window
//! every interval: it restores the permit pool to full capacity and zeroes the
//! window's request counter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use admission_gate::{AdmissionGate, FileSink, IntervalUnit, JsonCodec};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // 5 submissions per second, each written to its own file under ./out
//! let gate = Arc::new(
//!     AdmissionGate::builder(JsonCodec::new(), FileSink::new("out"))
//!         .with_capacity(5)
//!         .with_interval_unit(IntervalUnit::Seconds)
//!         .build()?,
//! );
//!
//! let payload = std::fs::read("document.json")?;
//! let ack = gate.submit(&payload, "signature").await?;
//! println!("stored at {}", ack.location.display());
//!
//! gate.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Window Modes
//!
//! - **Quota** (default): a permit whose request reached the sink stays spent
//!   until the next reset, so at most `capacity` documents reach the sink per
//!   window.
//! - **Concurrency**: every permit returns to the pool when its request
//!   finishes. The pool bounds in-flight submissions and the request counter
//!   reports windows that admit more than `capacity`.
//!
//! Requests that fail to decode, and requests rejected before decoding,
//! always return their permit at once.
//!
//! ## Over-Limit Admissions
//!
//! When a window admits more than `capacity` requests the gate logs
//! `"request limit exceeded"` at WARN with `count` and `limit` fields and
//! increments [`GateMetrics::over_limit`]. With
//! [`OverLimitAction::Reject`] the submission also fails with
//! [`GateError::LimitExceeded`] before its payload is decoded.
//!
//! ## Cancellation
//!
//! [`AdmissionGate::submit_with_cancel`] races the wait for a permit against
//! any future. A submission cancelled while waiting never holds a permit and
//! never reaches the codec. Dropping a pending `submit` future has the same
//! effect.
//!
//! ```rust,no_run
//! # use admission_gate::{AdmissionGate, GateError, JsonCodec, FileSink};
//! # use std::time::Duration;
//! # async fn run(gate: AdmissionGate<JsonCodec, FileSink>, payload: &[u8]) {
//! let deadline = tokio::time::sleep(Duration::from_secs(2));
//! match gate.submit_with_cancel(payload, "signature", deadline).await {
//!     Err(GateError::OperationCancelled) => eprintln!("gave up waiting"),
//!     other => println!("{other:?}"),
//! }
//! # }
//! ```
//!
//! ## Observability
//!
//! ```rust,no_run
//! # use admission_gate::{AdmissionGate, JsonCodec, FileSink};
//! # fn report(gate: &AdmissionGate<JsonCodec, FileSink>) {
//! let snapshot = gate.metrics().snapshot();
//! println!(
//!     "admitted={} persisted={} in_flight={} failure_rate={:.2}",
//!     snapshot.admitted,
//!     snapshot.persisted,
//!     snapshot.in_flight(),
//!     snapshot.failure_rate(),
//! );
//! println!("window count: {}", gate.window_count());
//! println!("next reset: {:?}", gate.scheduler_state().next_fire_at);
//! # }
//! ```
//!
//! ## Shutdown
//!
//! [`AdmissionGate::shutdown`] closes the gate, then stops the reset task and
//! waits for it to exit. Admitted submissions finish normally; waiting and
//! later submissions fail with [`GateError::Closed`]. It is safe to call more
//! than once.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    config::{ConfigError, GateConfig, IntervalUnit, MissedTicks, OverLimitAction, WindowMode},
    document::{Description, Document, Product},
    request::RequestState,
};

pub use application::{
    counter::{CountObservation, RequestCounter},
    gate::{AdmissionGate, AdmissionGateBuilder, GateError},
    metrics::{GateMetrics, MetricsSnapshot},
    permit_pool::{AcquireError, Permit, PermitPool},
    ports::{Ack, DecodeError, DocumentCodec, DocumentSink, PersistError},
    scheduler::{
        ResetReport, ResetScheduler, SchedulerConfig, SchedulerHandle, SchedulerMonitor,
        SchedulerState, ShutdownError,
    },
};

pub use infrastructure::{
    codec::JsonCodec,
    sink::{render_document, FileSink},
};
