//! Work that outlives the event handler that started it.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::warn;

/// Background tasks a worker has promised to finish (`event.waitUntil`).
///
/// Dropping the set aborts whatever is still running, the same way a host
/// terminating the worker would.
#[derive(Debug, Default)]
pub struct ExtendableTasks {
    set: Mutex<JoinSet<()>>,
}

impl ExtendableTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background. Must be called inside a tokio runtime.
    ///
    /// Tasks that already finished are collected first, so the set only
    /// holds work that is still running.
    pub async fn extend<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().await;
        reap(&mut set);
        set.spawn(task);
    }

    /// Number of tasks still running.
    pub async fn pending(&self) -> usize {
        let mut set = self.set.lock().await;
        reap(&mut set);
        set.len()
    }

    /// Wait for every task, including ones spawned while waiting. Returns how
    /// many were still outstanding.
    pub async fn settle(&self) -> usize {
        let mut settled = 0;
        loop {
            let mut set = std::mem::take(&mut *self.set.lock().await);
            if set.is_empty() {
                return settled;
            }
            while let Some(result) = set.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Background task did not complete");
                }
                settled += 1;
            }
        }
    }
}

fn reap(set: &mut JoinSet<()>) {
    while let Some(result) = set.try_join_next() {
        if let Err(e) = result {
            warn!(error = %e, "Background task did not complete");
        }
    }
}
