//! Request lifecycle.

use std::fmt;

/// State of a single submission.
///
/// ```text
/// Pending -> Admitted -> Decoded -> Persisted
///                     |          -> PersistFailed
///                     -> DecodeFailed
///                     -> Rejected
/// Pending -> Cancelled
/// ```
///
/// `Admitted` and `Decoded` are the only states in which a permit is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Waiting for a permit
    Pending,
    /// Holding a permit
    Admitted,
    /// Payload decoded, sink not yet answered
    Decoded,
    /// Sink acknowledged the document
    Persisted,
    /// Payload could not be decoded
    DecodeFailed,
    /// Sink failed to record the document
    PersistFailed,
    /// Refused because the window was already over its limit
    Rejected,
    /// Cancelled while waiting for a permit
    Cancelled,
}

impl RequestState {
    /// Whether the request has finished.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Persisted
                | RequestState::DecodeFailed
                | RequestState::PersistFailed
                | RequestState::Rejected
                | RequestState::Cancelled
        )
    }

    /// Whether a permit is held in this state.
    pub fn holds_permit(self) -> bool {
        matches!(self, RequestState::Admitted | RequestState::Decoded)
    }

    /// Whether the request reached the sink.
    pub fn reached_sink(self) -> bool {
        matches!(self, RequestState::Persisted | RequestState::PersistFailed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Pending => "pending",
            RequestState::Admitted => "admitted",
            RequestState::Decoded => "decoded",
            RequestState::Persisted => "persisted",
            RequestState::DecodeFailed => "decode_failed",
            RequestState::PersistFailed => "persist_failed",
            RequestState::Rejected => "rejected",
            RequestState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
