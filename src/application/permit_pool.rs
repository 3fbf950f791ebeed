//! Bounded pool of admission permits.
//!
//! The pool wraps a fair (FIFO) `tokio::sync::Semaphore`. Permits handed out
//! by the semaphore are forgotten immediately and tracked by an owned
//! [`Permit`] guard instead, so the pool itself decides what a release means:
//!
//! - A release of a permit taken in the current epoch returns it to the
//!   semaphore, capped at `capacity`.
//! - [`PermitPool::resynchronize`] restores the pool to full capacity and
//!   starts a new epoch. Permits taken before it are already accounted for,
//!   so their later release is absorbed.
//!
//! Releases, retirements and resynchronization are ordered by a short mutex
//! around a small ledger (epoch and per-epoch counts). Acquisition never takes
//! that mutex while waiting.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, TryAcquireError};

/// Error returned when acquiring a permit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The cancellation future resolved before a permit was granted
    #[error("acquisition cancelled")]
    Cancelled,
    /// The pool was closed while waiting
    #[error("permit pool is closed")]
    Closed,
}

/// A bounded, fair pool of permits.
///
/// # Example
/// ```
/// use admission_gate::PermitPool;
/// use std::sync::Arc;
///
/// # tokio_test_block_on(async {
/// let pool = Arc::new(PermitPool::new(2));
///
/// let first = pool.acquire().await.unwrap();
/// let _second = pool.acquire().await.unwrap();
/// assert_eq!(pool.available(), 0);
/// assert!(pool.try_acquire().is_none());
///
/// first.release();
/// assert_eq!(pool.available(), 1);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct PermitPool {
    capacity: usize,
    semaphore: Semaphore,
    ledger: Mutex<Ledger>,
}

/// Accounting for permits taken out of the semaphore.
#[derive(Debug, Default)]
struct Ledger {
    epoch: u64,
    /// Current-epoch permits held by a `Permit`
    held: usize,
    /// Current-epoch permits spent until the next resynchronization
    retired: usize,
    /// Permits granted before a resynchronization whose holder has not
    /// stamped them yet
    carried: usize,
}

impl PermitPool {
    /// Create a pool with `capacity` permits, all available.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            semaphore: Semaphore::new(capacity),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Wait for a permit.
    ///
    /// Waiters are served in arrival order. Dropping the returned future
    /// before it completes takes no permit.
    ///
    /// # Errors
    /// Returns `AcquireError::Closed` if the pool is closed.
    pub async fn acquire(self: &Arc<Self>) -> Result<Permit, AcquireError> {
        let waited_from = self.current_epoch();
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AcquireError::Closed)?;
        permit.forget();

        Ok(Permit::new(Arc::clone(self), self.stamp(waited_from)))
    }

    /// Wait for a permit unless `cancel` resolves first.
    ///
    /// If `cancel` is already resolved on the first poll, no permit is taken
    /// even when one is available.
    ///
    /// # Errors
    /// Returns `AcquireError::Cancelled` if `cancel` wins and
    /// `AcquireError::Closed` if the pool is closed.
    pub async fn acquire_until<F>(self: &Arc<Self>, cancel: F) -> Result<Permit, AcquireError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = cancel => Err(AcquireError::Cancelled),
            permit = self.acquire() => permit,
        }
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        let waited_from = self.current_epoch();
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                Some(Permit::new(Arc::clone(self), self.stamp(waited_from)))
            }
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Restore the pool to full capacity and start a new epoch.
    ///
    /// Returns the number of permits reclaimed. Permits handed out before this
    /// call stay valid for their holders, but releasing them no longer adds
    /// to the pool. This includes permits the semaphore granted to a waiter
    /// that has not observed the grant yet.
    pub fn resynchronize(&self) -> usize {
        let mut ledger = self.lock_ledger();
        let available = self.semaphore.available_permits();

        // Whatever is missing from the semaphore but not held or retired in
        // this epoch was granted to a waiter that has not stamped it yet.
        // Permits above capacity were granted, then handed back by a dropped
        // waiter, so they no longer await a stamp either.
        let missing = self.capacity.saturating_sub(available);
        let excess = available.saturating_sub(self.capacity);
        let accounted = ledger.held + ledger.retired + excess;
        if missing >= accounted {
            ledger.carried += missing - accounted;
        } else {
            ledger.carried = ledger.carried.saturating_sub(accounted - missing);
        }

        ledger.epoch = ledger.epoch.wrapping_add(1);
        ledger.held = 0;
        ledger.retired = 0;

        if missing > 0 {
            self.semaphore.add_permits(missing);
        } else if excess > 0 {
            self.trim(excess);
        }
        missing
    }

    /// Close the pool.
    ///
    /// Current and future waiters fail with `AcquireError::Closed`. Permits
    /// already handed out stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Total permits per epoch.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits available right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits not currently available.
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Current epoch, incremented by every resynchronization.
    pub fn epoch(&self) -> u64 {
        self.current_epoch()
    }

    fn current_epoch(&self) -> u64 {
        self.lock_ledger().epoch
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign a granted permit to an epoch.
    ///
    /// A holder that started waiting before the latest resynchronization may
    /// own a permit that resynchronization already replaced; those are
    /// stamped with their old epoch so that releasing them is absorbed.
    fn stamp(&self, waited_from: u64) -> u64 {
        let mut ledger = self.lock_ledger();

        if ledger.epoch != waited_from && ledger.carried > 0 {
            ledger.carried -= 1;
            return waited_from;
        }

        ledger.held += 1;
        ledger.epoch
    }

    fn trim(&self, excess: usize) {
        let excess = u32::try_from(excess).unwrap_or(u32::MAX);
        if let Ok(permits) = self.semaphore.try_acquire_many(excess) {
            permits.forget();
        }
    }

    fn give_back(&self, permit_epoch: u64) -> bool {
        let mut ledger = self.lock_ledger();

        if ledger.epoch != permit_epoch {
            tracing::trace!(
                permit_epoch,
                current_epoch = ledger.epoch,
                "absorbed release of permit from an earlier window"
            );
            return false;
        }
        ledger.held = ledger.held.saturating_sub(1);

        if self.semaphore.available_permits() >= self.capacity {
            tracing::warn!(
                capacity = self.capacity,
                "release would exceed pool capacity; ignored"
            );
            return false;
        }

        self.semaphore.add_permits(1);
        true
    }

    fn spend(&self, permit_epoch: u64) {
        let mut ledger = self.lock_ledger();

        if ledger.epoch == permit_epoch {
            ledger.held = ledger.held.saturating_sub(1);
            ledger.retired += 1;
        }
    }
}

/// An acquired permit.
///
/// Every permit is resolved exactly once: by [`Permit::release`], by
/// [`Permit::retire`], or on drop (which releases unless
/// [`Permit::retire_on_drop`] was called). A release without a
/// matching acquire cannot be expressed.
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit {
    pool: Arc<PermitPool>,
    epoch: u64,
    resolved: bool,
    retire_on_drop: bool,
}

impl Permit {
    fn new(pool: Arc<PermitPool>, epoch: u64) -> Self {
        Self {
            pool,
            epoch,
            resolved: false,
            retire_on_drop: false,
        }
    }

    /// Retire instead of release if the permit is dropped unresolved.
    ///
    /// Explicit [`release`](Self::release) still returns the permit.
    pub fn retire_on_drop(&mut self) {
        self.retire_on_drop = true;
    }

    /// Return the permit to its pool.
    ///
    /// Returns `true` if the pool gained a permit, `false` if the release was
    /// absorbed because the pool was resynchronized since the acquire.
    pub fn release(mut self) -> bool {
        self.resolved = true;
        self.pool.give_back(self.epoch)
    }

    /// Keep the permit spent until the next resynchronization.
    pub fn retire(mut self) {
        self.resolved = true;
        self.pool.spend(self.epoch);
    }

    /// Epoch in which the permit was acquired.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if self.retire_on_drop {
            self.pool.spend(self.epoch);
        } else {
            self.pool.give_back(self.epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_acquire_until_exhausted() {
        let pool = Arc::new(PermitPool::new(3));

        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(pool.acquire().await.unwrap());
        }

        assert_eq!(pool.available(), 0);
        assert_eq!(pool.in_use(), 3);
        assert!(pool.try_acquire().is_none());
    }

    #[tokio::test]
    async fn test_release_restores_permit() {
        let pool = Arc::new(PermitPool::new(2));
        let permit = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 1);

        assert!(permit.release());
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_drop_releases_permit() {
        let pool = Arc::new(PermitPool::new(1));
        {
            let _permit = pool.acquire().await.unwrap();
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_retire_keeps_permit_spent() {
        let pool = Arc::new(PermitPool::new(2));
        pool.acquire().await.unwrap().retire();
        assert_eq!(pool.available(), 1);

        assert_eq!(pool.resynchronize(), 1);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_resynchronize_restores_full_capacity() {
        let pool = Arc::new(PermitPool::new(4));
        let _a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        pool.acquire().await.unwrap().retire();

        assert_eq!(pool.available(), 1);
        assert_eq!(pool.resynchronize(), 3);
        assert_eq!(pool.available(), 4);

        // Nothing to reclaim on a full pool
        assert_eq!(pool.resynchronize(), 0);
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test]
    async fn test_release_after_resync_never_exceeds_capacity() {
        let pool = Arc::new(PermitPool::new(2));
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();

        pool.resynchronize();
        assert_eq!(pool.available(), 2);

        assert!(!a.release());
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_stale_release_absorbed_while_new_window_busy() {
        let pool = Arc::new(PermitPool::new(2));
        let old = pool.acquire().await.unwrap();
        let old_epoch = old.epoch();

        pool.resynchronize();
        let fresh = pool.acquire().await.unwrap();
        assert!(fresh.epoch() > old_epoch);
        assert_eq!(pool.available(), 1);

        // The old holder's permit was already reclaimed by the resync
        assert!(!old.release());
        assert_eq!(pool.available(), 1);

        assert!(fresh.release());
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_fifo_grant_order() {
        let pool = Arc::new(PermitPool::new(1));
        let held = pool.acquire().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handles = Vec::new();
        for label in ["A", "B", "C"] {
            let pool = Arc::clone(&pool);
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let permit = pool.acquire().await.unwrap();
                tx.send(label).unwrap();
                permit.release();
            }));
            // Let the task register as a waiter before the next one arrives
            tokio::task::yield_now().await;
        }
        drop(tx);

        held.release();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut order = Vec::new();
        while let Some(label) = rx.recv().await {
            order.push(label);
        }
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_takes_no_permit() {
        let pool = Arc::new(PermitPool::new(1));
        let held = pool.acquire().await.unwrap();

        let result = pool
            .acquire_until(tokio::time::sleep(Duration::from_millis(50)))
            .await;
        assert_eq!(result.unwrap_err(), AcquireError::Cancelled);
        assert_eq!(pool.available(), 0);

        held.release();
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_takes_no_permit() {
        let pool = Arc::new(PermitPool::new(1));

        let result = pool.acquire_until(std::future::ready(())).await;
        assert_eq!(result.unwrap_err(), AcquireError::Cancelled);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let pool = Arc::new(PermitPool::new(1));
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;

        pool.close();
        assert_eq!(waiter.await.unwrap(), Err(AcquireError::Closed));
        assert!(pool.is_closed());

        // Held permits still resolve cleanly
        held.release();
    }

    #[tokio::test]
    async fn test_grant_observed_after_resync_is_absorbed() {
        let pool = Arc::new(PermitPool::new(1));
        let holder = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.unwrap() })
        };
        tokio::task::yield_now().await;

        // Hands the permit to the queued waiter, which has not run yet
        assert!(holder.release());
        assert_eq!(pool.resynchronize(), 1);

        let fresh = pool.try_acquire().expect("resync restored one permit");
        let late = waiter.await.unwrap();
        assert_ne!(late.epoch(), pool.epoch());
        assert_eq!(fresh.epoch(), pool.epoch());

        // The late holder's permit was replaced by the resync
        assert!(!late.release());
        assert!(pool.try_acquire().is_none());

        assert!(fresh.release());
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_resync_trims_permit_returned_by_dropped_waiter() {
        let pool = Arc::new(PermitPool::new(1));
        let holder = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|permit| permit.retire()) })
        };
        tokio::task::yield_now().await;

        assert!(holder.release());
        pool.resynchronize();

        // Dropping the granted-but-unpolled acquire hands its permit back
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(pool.available(), 2);

        pool.resynchronize();
        assert_eq!(pool.available(), 1);

        let permit = pool.try_acquire().expect("one permit after trim");
        assert!(pool.try_acquire().is_none());
        assert!(permit.release());
    }

    #[tokio::test]
    async fn test_retire_on_drop() {
        let pool = Arc::new(PermitPool::new(2));

        let mut permit = pool.acquire().await.unwrap();
        permit.retire_on_drop();
        drop(permit);
        assert_eq!(pool.available(), 1);

        // An explicit release still returns the permit
        let mut permit = pool.acquire().await.unwrap();
        permit.retire_on_drop();
        assert!(permit.release());
        assert_eq!(pool.available(), 1);

        assert_eq!(pool.resynchronize(), 1);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_concurrent_acquire_release_conserves_permits() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .unwrap();

        runtime.block_on(async {
            let pool = Arc::new(PermitPool::new(3));
            let mut handles = Vec::new();

            for _ in 0..16 {
                let pool = Arc::clone(&pool);
                handles.push(tokio::spawn(async move {
                    for _ in 0..50 {
                        let permit = pool.acquire().await.unwrap();
                        assert!(pool.available() <= pool.capacity());
                        tokio::task::yield_now().await;
                        permit.release();
                    }
                }));
            }

            for handle in handles {
                handle.await.unwrap();
            }

            assert_eq!(pool.available(), 3);
        });
    }
}
