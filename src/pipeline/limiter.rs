use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Admission gate over a stream of items.
///
/// Emits an item only while a slot is free; every emitted item holds a slot
/// until [`release_slot`](Self::release_slot) is called for it. Pending items
/// are re-checked on every release and on a fixed poll interval, so a missed
/// wake-up only delays admission.
///
/// Clones share the same slot counter.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    max: usize,
    available: AtomicUsize,
    released: Notify,
    poll_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_concurrency: usize) -> Self {
        Self::with_poll_interval(max_concurrency, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(max_concurrency: usize, poll_interval: Duration) -> Self {
        let max = max_concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                max,
                available: AtomicUsize::new(max),
                released: Notify::new(),
                poll_interval: poll_interval.max(Duration::from_millis(1)),
            }),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max
    }

    pub fn available_slots(&self) -> usize {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Items emitted and not yet released.
    pub fn occupied_slots(&self) -> usize {
        self.inner.max - self.available_slots()
    }

    /// Return one slot. Never raises the count above the configured maximum.
    pub fn release_slot(&self) {
        let max = self.inner.max;
        let _ = self
            .inner
            .available
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            });
        // `notify_one` stores a permit when nobody is waiting yet.
        self.inner.released.notify_one();
    }

    fn try_acquire(&self) -> bool {
        self.inner
            .available
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

#[async_trait]
impl<T> Pipe<T, T> for RateLimiter
where
    T: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "rate_limiter"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<T>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let buffer = buffer.max(1);
        let mut pending = VecDeque::<T>::new();
        let mut upstream_done = false;

        let mut poll = tokio::time::interval(self.inner.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while !pending.is_empty() && self.try_acquire() {
                let Some(item) = pending.pop_front() else { break };

                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::TRACE,
                    event = "waivepipe.limiter.admit",
                    available = self.available_slots(),
                    pending = pending.len(),
                    "waivepipe.limiter.admit"
                );

                if output.send(item).await.is_err() {
                    self.release_slot();
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::INFO, event = "waivepipe.downstream.closed", stage = "rate_limiter", "waivepipe.downstream.closed");
                    return Ok(());
                }
            }

            if upstream_done && pending.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::DEBUG, event = "waivepipe.cancelled", stage = "rate_limiter", dropped = pending.len(), "waivepipe.cancelled");
                    break;
                },
                msg = input.recv(), if !upstream_done && pending.len() < buffer => {
                    match msg {
                        Some(item) => pending.push_back(item),
                        None => upstream_done = true,
                    }
                },
                _ = self.inner.released.notified() => {},
                _ = poll.tick() => {},
            }
        }
        Ok(())
    }
}
