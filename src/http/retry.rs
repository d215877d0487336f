use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::backoff::Backoff;
use crate::http::request::{RequestTemplate, Response};
use crate::http::sender::{BoxSender, Layer, Sender};

type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    retry_if: RetryPredicate,
}

impl RetryPolicy {
    /// `max_attempts` counts the initial attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::default(),
            retry_if: Arc::new(default_retryable),
        }
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn is_retryable(&self, error: &Error) -> bool {
        (self.retry_if)(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

fn default_retryable(error: &Error) -> bool {
    match error {
        Error::Transport(_) => true,
        other => other.as_api_error().is_some_and(|e| e.is_retryable()),
    }
}

fn retryable_status(status: u16) -> bool {
    status == 408 || status >= 500
}

pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl Layer for RetryLayer {
    fn layer(&self, inner: BoxSender) -> BoxSender {
        Arc::new(RetrySender {
            inner,
            policy: self.policy.clone(),
        })
    }
}

pub struct RetrySender {
    inner: BoxSender,
    policy: RetryPolicy,
}

#[async_trait]
impl Sender for RetrySender {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1u32;

        loop {
            // Every attempt is issued from the same template; the body is
            // never consumed.
            let outcome = self.inner.send(request).await;

            let retryable = match &outcome {
                Ok(response) => retryable_status(response.status()),
                Err(error) => self.policy.is_retryable(error),
            };
            if !retryable {
                return outcome;
            }

            if attempt >= max_attempts {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::ERROR,
                    event = "waivepipe.retry.exhausted",
                    method = %request.method(),
                    url = request.url(),
                    attempts = max_attempts,
                    "waivepipe.retry.exhausted"
                );
                return outcome;
            }

            let delay = self.policy.backoff.delay(attempt);

            #[cfg(feature = "tracing")]
            {
                let reason = match &outcome {
                    Ok(response) => format!("status {}", response.status()),
                    Err(error) => error.to_string(),
                };
                tracing::event!(
                    tracing::Level::WARN,
                    event = "waivepipe.retry.sleep",
                    method = %request.method(),
                    url = request.url(),
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "waivepipe.retry.sleep"
                );
            }

            drop(outcome);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
