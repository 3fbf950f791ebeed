//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - JSON payload decoding
//! - File-backed persistence

pub mod codec;
pub mod sink;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides in-memory sinks, a counting codec and a
/// tracing capture layer.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// admission-gate = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
