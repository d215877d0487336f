use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::token::{AccessToken, TokenSource};
use crate::error::{ApiError, Error};
use crate::http::request::{form_encode, RequestTemplate};
use crate::http::sender::RequestSender;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    /// Lifetime in seconds.
    expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Exchanges a client id/secret pair for a bearer token.
///
/// Requests go through `sender`, which must not itself inject tokens.
pub struct ClientCredentials {
    sender: RequestSender,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    pub fn new(
        sender: RequestSender,
        api_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            token_url: format!("{}/oauth/token", api_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn request(&self) -> RequestTemplate {
        let body = form_encode(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ]);
        RequestTemplate::post(&self.token_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "application/json")
            .body(body)
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn fetch_token(&self) -> Result<AccessToken, ApiError> {
        let request = self.request();
        let response = self.sender.send(&request).await?;
        let token = response
            .json::<TokenResponse>()
            .map_err(|err: Error| err.into_api_error(&request))?;

        Ok(AccessToken::new(
            token.token_type,
            token.access_token,
            Duration::from_secs(token.expires_in),
        ))
    }
}
