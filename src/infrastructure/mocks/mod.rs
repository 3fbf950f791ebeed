//! Mock implementations for testing.
//!
//! This module provides test doubles for the codec and sink ports and a
//! tracing layer that captures emitted events, enabling controlled testing
//! of the gate without touching the filesystem.

pub mod codec;
pub mod layer;
pub mod sink;

pub use codec::{sample_payload, CountingCodec};
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use sink::{FailingSink, PersistedRecord, RecordingSink};
