use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ApiError, Result};
use crate::http::request::{RequestTemplate, Response};

/// One link of a sender chain: a raw transport or a layer wrapping one.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, request: &RequestTemplate) -> Result<Response>;
}

pub type BoxSender = Arc<dyn Sender>;

/// Middleware that wraps an inner sender into a new one.
pub trait Layer: Send + Sync {
    fn layer(&self, inner: BoxSender) -> BoxSender;
}

/// Compose `layers` around `transport`. The first layer is the outermost.
pub fn build_chain(transport: BoxSender, layers: Vec<Box<dyn Layer>>) -> RequestSender {
    let inner = layers
        .iter()
        .rev()
        .fold(transport, |inner, layer| layer.layer(inner));
    RequestSender { inner }
}

/// The outer boundary of a sender chain.
///
/// Whatever the layers raise, only [`ApiError`] leaves `send`.
#[derive(Clone)]
pub struct RequestSender {
    inner: BoxSender,
}

impl RequestSender {
    pub async fn send(&self, request: &RequestTemplate) -> std::result::Result<Response, ApiError> {
        self.inner
            .send(request)
            .await
            .map_err(|err| err.into_api_error(request))
    }
}
