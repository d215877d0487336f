use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ApiError, Error, Result};
use crate::http::request::{RequestTemplate, Response};
use crate::http::sender::{BoxSender, Layer, Sender};

/// Translates transport failures into [`ApiError`] tagged with method and
/// URL, and optionally bounds each attempt with a deadline.
#[derive(Debug, Clone, Default)]
pub struct TimeoutLayer {
    deadline: Option<Duration>,
}

impl TimeoutLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Layer for TimeoutLayer {
    fn layer(&self, inner: BoxSender) -> BoxSender {
        Arc::new(TimeoutSender {
            inner,
            deadline: self.deadline,
        })
    }
}

pub struct TimeoutSender {
    inner: BoxSender,
    deadline: Option<Duration>,
}

#[async_trait]
impl Sender for TimeoutSender {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        let outcome = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, self.inner.send(request)).await
            {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    return Err(Error::Api(ApiError::Timeout {
                        method: request.method(),
                        url: request.url().to_string(),
                    }))
                }
            },
            None => self.inner.send(request).await,
        };

        outcome.map_err(|err| match err {
            Error::Transport(transport) => Error::Api(transport.into_api_error()),
            other => other,
        })
    }
}
