use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Bounded-concurrency task executor.
///
/// The pool only accounts for slots. A task that fails or panics frees its
/// slot and leaves every other task running; reporting errors is the task's
/// own business.
#[derive(Clone)]
pub struct WorkPool {
    max: usize,
    slots: Arc<Semaphore>,
}

impl WorkPool {
    pub fn new(max_concurrency: usize) -> Self {
        let max = max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            max,
            slots: Arc::new(Semaphore::new(max)),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max
    }

    /// Tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max.saturating_sub(self.slots.available_permits())
    }

    /// Spawn `task` once a slot is free.
    ///
    /// Suspends the caller while all slots are taken. Fails only if the pool
    /// has been closed.
    pub async fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::pipeline("work pool closed"))?;

        tokio::spawn(async move {
            // Dropped on completion and on unwind alike.
            let _permit = permit;
            task.await;
        });
        Ok(())
    }

    /// Resolve once every submitted task has finished.
    ///
    /// Returns immediately on a closed pool.
    pub async fn wait_idle(&self) {
        if let Ok(all) = self.slots.acquire_many(self.max as u32).await {
            drop(all);
        }
    }

    /// Stop accepting work. Waiters in [`submit`](Self::submit) fail and
    /// [`wait_idle`](Self::wait_idle) returns; running tasks are left alone.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }
}
