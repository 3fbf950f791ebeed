//! Domain layer - pure business logic with no runtime dependencies.
//!
//! This layer contains the core concepts of admission control:
//! - Gate configuration and its validation
//! - The document schema accepted by the gate
//! - The lifecycle of a single request
//!
//! All types in this layer are pure and easily testable.

pub mod config;
pub mod document;
pub mod request;
