use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::http::request::{RequestTemplate, Response};
use crate::http::sender::{BoxSender, Layer, Sender};

/// Turns non-2xx responses into [`ApiError`].
///
/// JSON bodies with a `message` field become [`ApiError::Remote`]; anything
/// else is reported by status alone.
#[derive(Default)]
pub struct ClassifyLayer;

impl Layer for ClassifyLayer {
    fn layer(&self, inner: BoxSender) -> BoxSender {
        Arc::new(ClassifySender { inner })
    }
}

pub struct ClassifySender {
    inner: BoxSender,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl Sender for ClassifySender {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        let response = self.inner.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        Err(classify_failure(&response).into())
    }
}

fn classify_failure(response: &Response) -> ApiError {
    let status = response.status();
    if response.is_json() {
        if let Ok(body) = response.json::<ErrorBody>() {
            return ApiError::Remote {
                status,
                message: body.message,
            };
        }
    }
    ApiError::Status {
        status,
        reason: response.reason().to_string(),
    }
}
