//! Gate configuration values.
//!
//! A [`GateConfig`] is validated once at construction and never changes
//! afterwards. The knobs beyond capacity and interval all have defaults that
//! match a plain fixed-window limiter.

use std::time::Duration;

/// Error returned when gate configuration validation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Capacity must allow at least one request per window
    #[error("capacity must be greater than 0")]
    ZeroCapacity,
    /// Window interval must be greater than zero
    #[error("interval must be greater than 0")]
    ZeroInterval,
}

/// Unit of time used to express a window of exactly one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    /// One millisecond
    Milliseconds,
    /// One second
    Seconds,
    /// One minute
    Minutes,
    /// One hour
    Hours,
    /// One day
    Days,
}

impl IntervalUnit {
    /// Length of a single unit.
    pub fn as_duration(self) -> Duration {
        match self {
            IntervalUnit::Milliseconds => Duration::from_millis(1),
            IntervalUnit::Seconds => Duration::from_secs(1),
            IntervalUnit::Minutes => Duration::from_secs(60),
            IntervalUnit::Hours => Duration::from_secs(60 * 60),
            IntervalUnit::Days => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What happens to a permit once its request has reached the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    /// The permit stays spent until the next reset.
    ///
    /// At most `capacity` requests reach the sink per window.
    #[default]
    Quota,
    /// The permit returns to the pool as soon as the request finishes.
    ///
    /// The pool then bounds in-flight requests only, and the request counter
    /// reports windows that admitted more than `capacity`.
    Concurrency,
}

/// Reaction to an admission that pushes the window count past capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverLimitAction {
    /// Log and count the observation, then process the request anyway.
    #[default]
    Report,
    /// Fail the request with `LimitExceeded` without decoding it.
    Reject,
}

/// Timer behaviour when the reset task falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissedTicks {
    /// Drop missed ticks and stay aligned to the original schedule.
    #[default]
    Skip,
    /// Fire all missed ticks back to back.
    Burst,
}

impl From<MissedTicks> for tokio::time::MissedTickBehavior {
    fn from(value: MissedTicks) -> Self {
        match value {
            MissedTicks::Skip => tokio::time::MissedTickBehavior::Skip,
            MissedTicks::Burst => tokio::time::MissedTickBehavior::Burst,
        }
    }
}

/// Validated configuration for an admission gate.
///
/// # Example
/// ```
/// use admission_gate::{GateConfig, IntervalUnit, WindowMode};
/// use std::time::Duration;
///
/// let config = GateConfig::per_unit(IntervalUnit::Seconds, 5).unwrap();
/// assert_eq!(config.capacity(), 5);
/// assert_eq!(config.interval(), Duration::from_secs(1));
/// assert_eq!(config.window_mode(), WindowMode::Quota);
///
/// assert!(GateConfig::new(0, Duration::from_secs(1)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    capacity: usize,
    interval: Duration,
    window_mode: WindowMode,
    over_limit: OverLimitAction,
    missed_ticks: MissedTicks,
}

impl GateConfig {
    /// Create a configuration admitting `capacity` requests per `interval`.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroCapacity` if `capacity` is zero and
    /// `ConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(capacity: usize, interval: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            capacity,
            interval,
            window_mode: WindowMode::default(),
            over_limit: OverLimitAction::default(),
            missed_ticks: MissedTicks::default(),
        })
    }

    /// Create a configuration admitting `request_limit` requests per single `unit`.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroCapacity` if `request_limit` is zero.
    pub fn per_unit(unit: IntervalUnit, request_limit: usize) -> Result<Self, ConfigError> {
        Self::new(request_limit, unit.as_duration())
    }

    /// Set what happens to permits of requests that reached the sink.
    pub fn with_window_mode(mut self, mode: WindowMode) -> Self {
        self.window_mode = mode;
        self
    }

    /// Set the reaction to over-limit admissions.
    pub fn with_over_limit_action(mut self, action: OverLimitAction) -> Self {
        self.over_limit = action;
        self
    }

    /// Set the timer behaviour for missed reset ticks.
    pub fn with_missed_ticks(mut self, missed_ticks: MissedTicks) -> Self {
        self.missed_ticks = missed_ticks;
        self
    }

    /// Maximum permits per window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length of one window.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Configured window mode.
    pub fn window_mode(&self) -> WindowMode {
        self.window_mode
    }

    /// Configured over-limit reaction.
    pub fn over_limit_action(&self) -> OverLimitAction {
        self.over_limit
    }

    /// Configured missed-tick behaviour.
    pub fn missed_ticks(&self) -> MissedTicks {
        self.missed_ticks
    }
}
