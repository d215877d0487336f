use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::token::TokenCache;
use crate::error::Result;
use crate::http::request::{RequestTemplate, Response};
use crate::http::sender::{BoxSender, Layer, Sender};

/// Attaches `Authorization` from the token cache.
///
/// Auth failures are not retried here. A `401` drops the cached token, so
/// the next request through the chain exchanges credentials again.
pub struct TokenLayer {
    cache: Arc<TokenCache>,
}

impl TokenLayer {
    pub fn new(cache: Arc<TokenCache>) -> Self {
        Self { cache }
    }
}

impl Layer for TokenLayer {
    fn layer(&self, inner: BoxSender) -> BoxSender {
        Arc::new(TokenSender {
            inner,
            cache: self.cache.clone(),
        })
    }
}

pub struct TokenSender {
    inner: BoxSender,
    cache: Arc<TokenCache>,
}

#[async_trait]
impl Sender for TokenSender {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        let token = self.cache.fetch_token().await?;
        let authorized = request
            .clone()
            .header("Authorization", token.authorization());

        let response = self.inner.send(&authorized).await?;
        if response.status() == 401 {
            self.cache.invalidate();
        }
        Ok(response)
    }
}
