use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::http::request::{RequestTemplate, Response};
use crate::http::sender::{BoxSender, Layer, Sender};

/// Records start, completion and failure of every request.
///
/// Without the `tracing` feature this layer only forwards.
#[derive(Default)]
pub struct LoggingLayer;

impl Layer for LoggingLayer {
    fn layer(&self, inner: BoxSender) -> BoxSender {
        Arc::new(LoggingSender { inner })
    }
}

pub struct LoggingSender {
    inner: BoxSender,
}

#[async_trait]
impl Sender for LoggingSender {
    #[cfg(feature = "tracing")]
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        use std::error::Error as _;

        let started = tokio::time::Instant::now();
        tracing::event!(
            tracing::Level::TRACE,
            event = "waivepipe.request.start",
            method = %request.method(),
            url = request.url(),
            "waivepipe.request.start"
        );

        let outcome = self.inner.send(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(response) => tracing::event!(
                tracing::Level::TRACE,
                event = "waivepipe.request.completed",
                method = %request.method(),
                url = request.url(),
                status = response.status(),
                elapsed_ms = elapsed_ms,
                "waivepipe.request.completed"
            ),
            Err(err) => {
                let cause = err.source().map(|c| c.to_string());
                tracing::event!(
                    tracing::Level::ERROR,
                    event = "waivepipe.request.failed",
                    method = %request.method(),
                    url = request.url(),
                    elapsed_ms = elapsed_ms,
                    error = %err,
                    cause = cause.as_deref(),
                    "waivepipe.request.failed"
                );
            }
        }

        outcome
    }

    #[cfg(not(feature = "tracing"))]
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        self.inner.send(request).await
    }
}
