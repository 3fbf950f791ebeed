//! Periodic window reset.
//!
//! Once per interval the scheduler resynchronizes the permit pool to full
//! capacity and zeroes the request counter, regardless of how many permits
//! are held. The first reset happens one full interval after start.
//!
//! The scheduler only holds weak references to the pool and the counter;
//! when the gate that owns them is dropped, the task stops on its next tick.

use crate::application::counter::RequestCounter;
use crate::application::metrics::GateMetrics;
use crate::application::permit_pool::PermitPool;
use crate::domain::config::{ConfigError, MissedTicks};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Error returned when the reset task does not shut down cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The reset task panicked or was aborted
    #[error("reset task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration for the reset scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between resets
    pub interval: Duration,
    /// Timer behaviour when a tick is missed
    pub missed_ticks: MissedTicks,
}

impl SchedulerConfig {
    /// Create a scheduler config with the specified interval.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            interval,
            missed_ticks: MissedTicks::default(),
        })
    }

    /// Set the missed-tick behaviour.
    pub fn with_missed_ticks(mut self, missed_ticks: MissedTicks) -> Self {
        self.missed_ticks = missed_ticks;
        self
    }
}

/// Outcome of a single reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    /// Permits restored to the pool
    pub reclaimed: usize,
    /// Counter value of the window that just ended
    pub previous_count: usize,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    /// Whether the reset task is still running
    pub running: bool,
    /// Resets performed so far
    pub ticks: u64,
    /// When the next reset is scheduled, if running
    pub next_fire_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct SchedulerShared {
    running: AtomicBool,
    ticks: AtomicU64,
    next_fire_at: Mutex<Option<Instant>>,
}

impl SchedulerShared {
    fn set_next_fire_at(&self, at: Option<Instant>) {
        *self
            .next_fire_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = at;
    }

    fn snapshot(&self) -> SchedulerState {
        SchedulerState {
            running: self.running.load(Ordering::Acquire),
            ticks: self.ticks.load(Ordering::Acquire),
            next_fire_at: *self
                .next_fire_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Read-only view of a scheduler's state that outlives its handle.
#[derive(Debug, Clone)]
pub struct SchedulerMonitor {
    shared: Arc<SchedulerShared>,
}

impl SchedulerMonitor {
    /// Snapshot of the scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.shared.snapshot()
    }

    /// Whether the reset task is still running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

/// Resets the permit pool and request counter at a fixed period.
#[derive(Debug)]
pub struct ResetScheduler {
    pool: Weak<PermitPool>,
    counter: Weak<RequestCounter>,
    metrics: GateMetrics,
    config: SchedulerConfig,
}

impl ResetScheduler {
    /// Create a scheduler for the given pool and counter.
    pub fn new(
        pool: &Arc<PermitPool>,
        counter: &Arc<RequestCounter>,
        metrics: GateMetrics,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            pool: Arc::downgrade(pool),
            counter: Arc::downgrade(counter),
            metrics,
            config,
        }
    }

    /// Perform one reset now.
    ///
    /// Returns `None` if the pool or counter no longer exist.
    pub fn reset_once(&self) -> Option<ResetReport> {
        let pool = self.pool.upgrade()?;
        let counter = self.counter.upgrade()?;

        let reclaimed = pool.resynchronize();
        let previous_count = counter.reset();
        self.metrics.record_reset(reclaimed);

        tracing::debug!(
            reclaimed,
            previous_count,
            capacity = pool.capacity(),
            "request counter reset"
        );

        Some(ResetReport {
            reclaimed,
            previous_count,
        })
    }

    /// Get the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start resetting periodically.
    ///
    /// This spawns a background task on the current Tokio runtime. The first
    /// reset happens one interval from now. The task stops when
    /// [`SchedulerHandle::shutdown`] is called, when the handle is dropped,
    /// or when the pool is gone.
    pub fn start(self) -> SchedulerHandle {
        let shared = Arc::new(SchedulerShared::default());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let period = self.config.interval;
        let first = Instant::now() + period;
        shared.running.store(true, Ordering::Release);
        shared.set_next_fire_at(Some(first));

        let task_shared = Arc::clone(&shared);
        let join = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(self.config.missed_ticks.into());

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    fired_at = ticker.tick() => {
                        if self.reset_once().is_none() {
                            tracing::debug!("permit pool dropped; stopping reset task");
                            break;
                        }
                        task_shared.ticks.fetch_add(1, Ordering::AcqRel);
                        task_shared.set_next_fire_at(Some(fired_at + period));
                    }
                }
            }

            task_shared.set_next_fire_at(None);
            task_shared.running.store(false, Ordering::Release);
        });

        SchedulerHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
            shared,
        }
    }
}

/// Handle to a running reset task.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also
/// stops the task, but does not wait for it.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    shared: Arc<SchedulerShared>,
}

impl SchedulerHandle {
    /// Stop the task and wait for it to exit.
    ///
    /// No reset happens after this returns.
    ///
    /// # Errors
    /// Returns `ShutdownError::Task` if the task panicked.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already have exited on its own
            let _ = tx.send(());
        }
        (&mut self.join).await?;
        Ok(())
    }

    /// A monitor sharing this task's state.
    pub fn monitor(&self) -> SchedulerMonitor {
        SchedulerMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(capacity: usize) -> (Arc<PermitPool>, Arc<RequestCounter>, GateMetrics) {
        (
            Arc::new(PermitPool::new(capacity)),
            Arc::new(RequestCounter::new(capacity)),
            GateMetrics::new(),
        )
    }

    #[test]
    fn test_scheduler_config_zero_interval() {
        let result = SchedulerConfig::new(Duration::from_secs(0));
        assert_eq!(result, Err(ConfigError::ZeroInterval));
    }

    #[tokio::test]
    async fn test_reset_once_restores_pool_and_counter() {
        let (pool, counter, metrics) = setup(3);
        let config = SchedulerConfig::new(Duration::from_secs(1)).unwrap();
        let scheduler = ResetScheduler::new(&pool, &counter, metrics.clone(), config);

        pool.acquire().await.unwrap().retire();
        pool.acquire().await.unwrap().retire();
        counter.record();
        counter.record();

        let report = scheduler.reset_once().unwrap();
        assert_eq!(
            report,
            ResetReport {
                reclaimed: 2,
                previous_count: 2
            }
        );
        assert_eq!(pool.available(), 3);
        assert_eq!(counter.count(), 0);
        assert_eq!(metrics.resets(), 1);
        assert_eq!(metrics.permits_reclaimed(), 2);
    }

    #[tokio::test]
    async fn test_reset_once_after_pool_dropped() {
        let (pool, counter, metrics) = setup(1);
        let config = SchedulerConfig::new(Duration::from_secs(1)).unwrap();
        let scheduler = ResetScheduler::new(&pool, &counter, metrics, config);

        drop(pool);
        assert!(scheduler.reset_once().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_reset_after_one_interval() {
        let (pool, counter, metrics) = setup(2);
        let config = SchedulerConfig::new(Duration::from_secs(1)).unwrap();
        let handle = ResetScheduler::new(&pool, &counter, metrics, config).start();
        let monitor = handle.monitor();

        pool.acquire().await.unwrap().retire();
        pool.acquire().await.unwrap().retire();
        counter.record();

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(pool.available(), 0);
        assert_eq!(monitor.state().ticks, 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(pool.available(), 2);
        assert_eq!(counter.count(), 0);
        assert_eq!(monitor.state().ticks, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_period_ticks() {
        let (pool, counter, metrics) = setup(1);
        let config = SchedulerConfig::new(Duration::from_millis(100)).unwrap();
        let handle = ResetScheduler::new(&pool, &counter, metrics.clone(), config).start();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(metrics.resets(), 3);

        let state = handle.monitor().state();
        assert!(state.running);
        assert!(state.next_fire_at.is_some());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reset_after_shutdown() {
        let (pool, counter, metrics) = setup(1);
        let config = SchedulerConfig::new(Duration::from_millis(100)).unwrap();
        let handle = ResetScheduler::new(&pool, &counter, metrics.clone(), config).start();
        let monitor = handle.monitor();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await.unwrap();
        let resets_at_shutdown = metrics.resets();

        pool.acquire().await.unwrap().retire();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(metrics.resets(), resets_at_shutdown);
        assert_eq!(pool.available(), 0);
        assert!(!monitor.is_running());
        assert_eq!(monitor.state().next_fire_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stops_when_pool_dropped() {
        let (pool, counter, metrics) = setup(1);
        let config = SchedulerConfig::new(Duration::from_millis(100)).unwrap();
        let handle = ResetScheduler::new(&pool, &counter, metrics, config).start();
        let monitor = handle.monitor();

        drop(pool);
        drop(counter);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!monitor.is_running());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_task() {
        let (pool, counter, metrics) = setup(1);
        let config = SchedulerConfig::new(Duration::from_millis(100)).unwrap();
        let handle = ResetScheduler::new(&pool, &counter, metrics.clone(), config).start();
        let monitor = handle.monitor();

        drop(handle);
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(!monitor.is_running());
        assert_eq!(metrics.resets(), 0);
    }
}
