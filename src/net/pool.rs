//! Bounded worker pool for request dispatch.
//!
//! # Responsibilities
//! - Cap how many dispatches run at once across all connections
//! - Push back on submitters while every worker is busy
//! - Track in-flight work for graceful shutdown
//! - Cancel whatever is left once the grace period runs out
//!
//! # Design Decisions
//! - A worker slot is acquired before the task is spawned, so waiting
//!   submitters hold no task and the pool never queues more than its size
//! - Cancellation drops the task's future; blocking handler threads already
//!   running are left to finish on their own

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    in_flight: Arc<AtomicUsize>,
    cancel: watch::Sender<bool>,
}

/// Counts a task from spawn until its future is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            in_flight: Arc::new(AtomicUsize::new(0)),
            cancel,
        }
    }

    /// Wait for a free worker slot, then run `task` on it. Returns `None`
    /// without running anything if the pool is cancelled first. The handle
    /// yields `None` if the pool is cancelled while the task runs.
    pub async fn spawn<F>(&self, task: F) -> Option<JoinHandle<Option<F::Output>>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut cancel = self.cancel.subscribe();
        let permit = tokio::select! {
            biased;
            Ok(_) = cancel.wait_for(|c| *c) => return None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok()?,
        };
        let slot = InFlight::enter(&self.in_flight);

        Some(tokio::spawn(async move {
            let _slot = slot;
            let _permit = permit;
            tokio::select! {
                output = task => Some(output),
                Ok(_) = cancel.wait_for(|c| *c) => None,
            }
        }))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks holding a worker slot. Never exceeds `size`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait up to `grace` for in-flight work, then cancel the rest. Returns
    /// whether the pool drained on its own.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let drained = tokio::time::timeout(grace, async {
            while self.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                remaining = self.in_flight(),
                "Grace period elapsed, cancelling dispatches"
            );
        }
        self.cancel.send_replace(true);
        self.permits.close();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_tasks() {
        let pool = WorkerPool::new(2);
        let handle = pool.spawn(async { 41 + 1 }).await.unwrap();
        assert_eq!(handle.await.unwrap(), Some(42));
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn bounds_concurrency() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let handle = pool
                .spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            assert!(pool.in_flight() <= pool.size());
            handles.push(handle);
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(()));
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn submitter_waits_while_workers_are_busy() {
        let pool = WorkerPool::new(1);
        let busy = pool
            .spawn(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(pool.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(20), pool.spawn(async {})).await;
        assert!(blocked.is_err());
        assert_eq!(pool.in_flight(), 1);

        busy.await.unwrap();
        let next = pool.spawn(async { "next" }).await.unwrap();
        assert_eq!(next.await.unwrap(), Some("next"));
    }

    #[tokio::test]
    async fn shutdown_drains_within_grace() {
        let pool = WorkerPool::new(1);
        let handle = pool
            .spawn(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                "done"
            })
            .await
            .unwrap();

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(handle.await.unwrap(), Some("done"));
    }

    #[tokio::test]
    async fn shutdown_cancels_after_grace() {
        let pool = Arc::new(WorkerPool::new(1));
        let stuck = pool.spawn(std::future::pending::<()>()).await.unwrap();
        let waiting = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.spawn(async {}).await.is_none() }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!pool.shutdown(Duration::from_millis(50)).await);
        assert_eq!(stuck.await.unwrap(), None);
        assert!(waiting.await.unwrap());
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.spawn(async {}).await.is_none());
    }
}
