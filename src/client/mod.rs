//! Explicit API context shared by every pipeline component.

pub mod models;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::credentials::ClientCredentials;
use crate::auth::token::TokenCache;
use crate::document::Document;
use crate::error::Result;
use crate::http::auth::TokenLayer;
use crate::http::classify::ClassifyLayer;
use crate::http::logging::LoggingLayer;
use crate::http::request::RequestTemplate;
use crate::http::retry::{RetryLayer, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::http::sender::{build_chain, BoxSender, Layer, RequestSender};
use crate::http::timeout::TimeoutLayer;
use crate::http::transport::ReqwestTransport;

use models::{
    ClassifyResponse, CreatedDocument, DocumentList, ExtractionResult, RemoteDocument,
};

pub const DEFAULT_API_URL: &str = "https://api.waives.io";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_url: String,
    /// Per-attempt deadline in milliseconds. Zero disables it.
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub token_safety_margin_ms: u64,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_millis(timeout);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn token_safety_margin(mut self, margin: Duration) -> Self {
        self.token_safety_margin_ms = duration_millis(margin);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: 100_000,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            token_safety_margin_ms: 300_000,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Handle to the remote document API. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    sender: RequestSender,
    tokens: Arc<TokenCache>,
    api_url: Arc<str>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::default()))
    }

    /// Build both sender chains (token exchange and authorized requests)
    /// over `transport`.
    pub fn with_transport(config: ClientConfig, transport: BoxSender) -> Self {
        let api_url = config.api_url.trim_end_matches('/').to_string();
        let retry = RetryPolicy::new(config.max_attempts);
        let mut timeout = TimeoutLayer::new();
        if config.request_timeout_ms > 0 {
            timeout = timeout.deadline(Duration::from_millis(config.request_timeout_ms));
        }

        // No retry here: the exchange runs inside the authorized chain,
        // whose retry layer owns the attempt budget.
        let token_layers: Vec<Box<dyn Layer>> = vec![
            Box::new(LoggingLayer),
            Box::new(timeout.clone()),
            Box::new(ClassifyLayer),
        ];
        let token_chain = build_chain(transport.clone(), token_layers);
        let credentials =
            ClientCredentials::new(token_chain, &api_url, config.client_id, config.client_secret);
        let tokens = Arc::new(
            TokenCache::new(Arc::new(credentials))
                .safety_margin(Duration::from_millis(config.token_safety_margin_ms)),
        );

        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(LoggingLayer),
            Box::new(RetryLayer::new(retry)),
            Box::new(timeout),
            Box::new(ClassifyLayer),
            Box::new(TokenLayer::new(tokens.clone())),
        ];
        let sender = build_chain(transport, layers);

        Self {
            sender,
            tokens,
            api_url: api_url.into(),
        }
    }

    pub fn sender(&self) -> &RequestSender {
        &self.sender
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    pub async fn create_document(&self, document: &Document) -> Result<RemoteDocument> {
        let content = document.open().await?;
        let request = RequestTemplate::post(self.url("/documents"))
            .header("content-type", "application/octet-stream")
            .header("accept", "application/json")
            .body(content);
        let created: CreatedDocument = self.sender.send(&request).await?.json()?;
        Ok(RemoteDocument::new(created.id, document.clone()))
    }

    pub async fn classify(&self, remote: RemoteDocument, classifier: &str) -> Result<RemoteDocument> {
        let request = RequestTemplate::post(
            self.url(&format!("/documents/{}/classify/{}", remote.id(), classifier)),
        )
        .header("accept", "application/json");
        let response: ClassifyResponse = self.sender.send(&request).await?.json()?;
        Ok(remote.with_classification(response.classification))
    }

    pub async fn extract(&self, remote: RemoteDocument, extractor: &str) -> Result<RemoteDocument> {
        let request = RequestTemplate::post(
            self.url(&format!("/documents/{}/extract/{}", remote.id(), extractor)),
        )
        .header("accept", "application/json");
        let extraction: ExtractionResult = self.sender.send(&request).await?.json()?;
        Ok(remote.with_extraction(extraction))
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let request = RequestTemplate::delete(self.url(&format!("/documents/{id}")));
        self.sender.send(&request).await?;
        Ok(())
    }

    pub async fn list_documents(&self) -> Result<Vec<String>> {
        let request =
            RequestTemplate::get(self.url("/documents")).header("accept", "application/json");
        let list: DocumentList = self.sender.send(&request).await?.json()?;
        Ok(list.documents.into_iter().map(|d| d.id).collect())
    }

    /// Delete every document the account still holds. Returns how many
    /// were removed.
    pub async fn delete_all_documents(&self) -> Result<usize> {
        let ids = self.list_documents().await?;
        for id in &ids {
            self.delete_document(id).await?;
        }

        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::INFO,
            event = "waivepipe.client.swept",
            deleted = ids.len(),
            "waivepipe.client.swept"
        );

        Ok(ids.len())
    }
}
