//! Fire-and-forget background work
//!
//! Promotion runs after the client response; tasks go through a bounded
//! queue drained by one dedicated task. When the queue is full the task is
//! dropped and counted, keeping the request path free of backpressure.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

type Task = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Queue capacity before tasks are dropped
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct BackgroundTasks {
    tx: mpsc::Sender<Task>,
    dropped: Arc<AtomicU64>,
}

impl BackgroundTasks {
    /// Create the queue and spawn its drain task
    pub fn start(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Task>(capacity);
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                task.await;
            }
        });
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a task; drops it with a warning when the queue is full
    pub fn dispatch(&self, task: impl Future<Output = ()> + Send + 'static) {
        if self.tx.try_send(Box::pin(task)).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped, "Background queue full, dropping task");
        }
    }

    /// Tasks dropped so far due to a full queue
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatched_tasks_run() {
        let counter = Arc::new(AtomicU64::new(0));
        let tasks = BackgroundTasks::start(8);
        for _ in 0..3 {
            let counter = counter.clone();
            tasks.dispatch(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.dropped_count(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_and_counts() {
        let tasks = BackgroundTasks::start(1);
        // Block the drain task so the queue stays full
        tasks.dispatch(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tasks.dispatch(async {});
        for _ in 0..5 {
            tasks.dispatch(async {});
        }
        assert!(tasks.dropped_count() >= 4);
    }
}
