//! Concurrency limiter
//!
//! Caps the number of operations executing at once. Excess submissions wait
//! on tokio's semaphore, which hands out permits in FIFO order, so dispatch
//! follows submission order whenever slots are scarce.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::trace;

/// Default number of concurrently executing operations.
pub const DEFAULT_CONCURRENCY: usize = 2;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter allowing `limit` concurrent operations (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `operation` once a slot is free and return its output.
    ///
    /// The operation is not started until a slot is acquired. Its output,
    /// including an `Err`, is handed back untouched; nothing here retries or
    /// cancels other queued work.
    pub async fn submit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // The semaphore is private and never closed, so acquire cannot fail.
        let _permit = self.semaphore.acquire().await.ok();
        trace!(available = self.available(), limit = self.limit, "Limiter slot acquired");
        operation().await
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_zero_limit_is_clamped() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.limit(), 1);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let limiter = ConcurrencyLimiter::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6).map(|_| {
            let running = running.clone();
            let peak = peak.clone();
            limiter.submit(move || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
        });
        join_all(tasks).await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatch_is_fifo_with_single_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let started = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..5).map(|i| {
            let started = started.clone();
            limiter.submit(move || async move {
                started.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5 * (5 - i as u64))).await;
                i
            })
        });
        let outputs = join_all(tasks).await;

        assert_eq!(outputs, vec![0, 1, 2, 3, 4]);
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_queue() {
        let limiter = ConcurrencyLimiter::new(1);

        let tasks = (0..3).map(|i| {
            limiter.submit(move || async move {
                if i == 0 {
                    Err(format!("task {} failed", i))
                } else {
                    Ok(i)
                }
            })
        });
        let outputs = join_all(tasks).await;

        assert!(outputs[0].is_err());
        assert_eq!(outputs[1], Ok(1));
        assert_eq!(outputs[2], Ok(2));
        assert_eq!(limiter.available(), 1);
    }
}
