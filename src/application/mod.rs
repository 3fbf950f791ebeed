//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Permit pool (bounded, fair admission)
//! - Request counter (per-window bookkeeping)
//! - Reset scheduler (periodic window boundaries)
//! - Admission gate (the submission pipeline)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod counter;
pub mod gate;
pub mod metrics;
pub mod permit_pool;
pub mod ports;
pub mod scheduler;
