//! Bounded task pool for remote network operations
//!
//! Each remote owns one pool. `push` enqueues an asynchronous unit of work,
//! `wait` drains everything enqueued since the last drain and reopens the
//! pool for the next batch. Task errors are carried in the results rather
//! than raised, so the caller decides what is fatal.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{SplitcastError, SplitcastResult};

/// Fixed concurrency ceiling per remote
pub const MAX_TASKS_PER_REMOTE: usize = 10;

/// A reusable batch of bounded, cancellable async tasks
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: Mutex<JoinSet<SplitcastResult<()>>>,
}

/// Results of one drained batch, in completion order
pub struct PoolResults(Vec<SplitcastResult<()>>);

impl PoolResults {
    /// First error of the batch, if any; sibling errors are discarded
    pub fn first_error(self) -> SplitcastResult<()> {
        self.0.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TaskPool {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Enqueue a task. It starts once a permit is available and
    /// short-circuits without running its effect if the pool was cancelled.
    pub fn push<F>(&self, task: F)
    where
        F: Future<Output = SplitcastResult<()>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        self.tasks
            .lock()
            .expect("task pool mutex poisoned")
            .spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    SplitcastError::Internal("task pool semaphore closed".to_string())
                })?;
                if cancel.is_cancelled() {
                    return Ok(());
                }
                task.await
            });
    }

    /// Await every task enqueued since the last `wait` and open a fresh
    /// batch. Panics inside tasks surface as `TaskPanic` results.
    pub async fn wait(&self) -> PoolResults {
        let mut batch = std::mem::take(&mut *self.tasks.lock().expect("task pool mutex poisoned"));

        let mut results = Vec::new();
        while let Some(joined) = batch.join_next().await {
            results.push(joined.unwrap_or_else(|e| Err(SplitcastError::TaskPanic(e.to_string()))));
        }

        PoolResults(results)
    }

    /// Trip the cooperative cancellation signal. Tasks that have not yet
    /// started their effect return without performing it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn drains_and_reopens() {
        let pool = TaskPool::new(4);
        for _ in 0..8 {
            pool.push(async { Ok(()) });
        }
        let results = pool.wait().await;
        assert_eq!(results.len(), 8);
        assert!(results.first_error().is_ok());

        // Pool stays usable after a drain
        pool.push(async { Ok(()) });
        let results = pool.wait().await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn respects_concurrency_ceiling() {
        let pool = TaskPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.push(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.wait().await.first_error().unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn carries_first_error() {
        let pool = TaskPool::new(1);
        pool.push(async { Ok(()) });
        pool.push(async { Err(SplitcastError::Internal("boom".to_string())) });
        pool.push(async { Ok(()) });

        let err = pool.wait().await.first_error().unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn cancelled_tasks_skip_their_effect() {
        let pool = TaskPool::new(2);
        let ran = Arc::new(AtomicUsize::new(0));

        pool.cancel();
        for _ in 0..4 {
            let ran = Arc::clone(&ran);
            pool.push(async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.wait().await.first_error().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panic_becomes_task_error() {
        let pool = TaskPool::new(1);
        pool.push(async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });

        let err = pool.wait().await.first_error().unwrap_err();
        assert!(matches!(err, SplitcastError::TaskPanic(_)));
    }
}
