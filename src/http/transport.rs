use async_trait::async_trait;

use crate::error::{Error, Result, TransportError, TransportErrorKind};
use crate::http::request::{Method, RequestTemplate, Response};
use crate::http::sender::Sender;

/// Raw HTTP transport backed by `reqwest`.
///
/// Returns every response as-is, whatever its status. Failures before a
/// response arrives surface as [`TransportError`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sender for ReqwestTransport {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.clone());
        }

        let reply = builder
            .send()
            .await
            .map_err(|err| transport_error(request, &err))?;

        let mut response = Response::new(reply.status().as_u16());
        for (name, value) in reply.headers() {
            if let Ok(value) = value.to_str() {
                response = response.header(name.as_str(), value);
            }
        }
        let body = reply
            .bytes()
            .await
            .map_err(|err| transport_error(request, &err))?;

        Ok(response.body(body))
    }
}

fn transport_error(request: &RequestTemplate, err: &reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, request, err.to_string()).into()
}
