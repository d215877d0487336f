#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc::{Receiver, Sender as ChannelSender};
use waivepipe::client::{ApiClient, ClientConfig};
use waivepipe::document::Document;
use waivepipe::error::{Error, Result};
use waivepipe::http::request::{Method, RequestTemplate, Response};
use waivepipe::http::sender::Sender;
use waivepipe::pipeline::cancel::CancelToken;
use waivepipe::pipeline::pipe::Pipe;

pub const API_URL: &str = "http://fake.test";

type Override = Box<dyn Fn(&RequestTemplate) -> Option<Result<Response>> + Send + Sync>;

/// In-process stand-in for the remote document API.
pub struct FakeApi {
    requests: Mutex<Vec<RequestTemplate>>,
    existing: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    latency: Option<Duration>,
    override_fn: Option<Override>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            existing: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            max_live: AtomicUsize::new(0),
            latency: None,
            override_fn: None,
        }
    }

    pub fn with_existing(self, ids: &[&str]) -> Self {
        *self.existing.lock().expect("mutex poisoned") =
            ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer matching requests yourself; `None` falls through to the
    /// default routes.
    pub fn with_override<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestTemplate) -> Option<Result<Response>> + Send + Sync + 'static,
    {
        self.override_fn = Some(Box::new(f));
        self
    }

    pub fn requests(&self) -> Vec<RequestTemplate> {
        self.requests.lock().expect("mutex poisoned").clone()
    }

    pub fn count(&self, method: Method, path_fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method() == method && r.url().contains(path_fragment))
            .count()
    }

    pub fn token_requests(&self) -> usize {
        self.count(Method::Post, "/oauth/token")
    }

    pub fn creates(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method() == Method::Post && r.url().ends_with("/documents"))
            .count()
    }

    pub fn deletes(&self) -> usize {
        self.count(Method::Delete, "/documents/")
    }

    /// Highest number of remote documents alive at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    fn route(&self, request: &RequestTemplate) -> Result<Response> {
        let path = request
            .url()
            .strip_prefix(API_URL)
            .unwrap_or(request.url())
            .to_string();

        match (request.method(), path.as_str()) {
            (Method::Post, "/oauth/token") => Ok(Response::json_body(
                200,
                &json!({"access_token": "tok-1", "token_type": "Bearer", "expires_in": 3600}),
            )),
            (Method::Post, "/documents") => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_live.fetch_max(live, Ordering::SeqCst);
                Ok(Response::json_body(201, &json!({"id": format!("doc-{n}")})))
            }
            (Method::Get, "/documents") => {
                let ids = self.existing.lock().expect("mutex poisoned").clone();
                let documents: Vec<_> = ids.iter().map(|id| json!({"id": id})).collect();
                Ok(Response::json_body(200, &json!({"documents": documents})))
            }
            (Method::Delete, p) if p.starts_with("/documents/") => {
                let id = &p["/documents/".len()..];
                let mut existing = self.existing.lock().expect("mutex poisoned");
                if let Some(pos) = existing.iter().position(|e| e == id) {
                    existing.remove(pos);
                } else {
                    self.live.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(Response::new(204))
            }
            (Method::Post, p) if p.contains("/classify/") => Ok(Response::json_body(
                200,
                &json!({
                    "classification": {
                        "document_type": "Invoice",
                        "relative_confidence": 2.5,
                        "is_confident": true,
                        "document_type_scores": [
                            {"document_type": "Invoice", "score": 41.2},
                            {"document_type": "Receipt", "score": 12.0}
                        ]
                    }
                }),
            )),
            (Method::Post, p) if p.contains("/extract/") => Ok(Response::json_body(
                200,
                &json!({"field_results": [{"field_name": "Amount", "result": {"text": "42.00"}}]}),
            )),
            _ => Ok(Response::json_body(404, &json!({"message": "no such route"}))),
        }
    }
}

#[async_trait]
impl Sender for FakeApi {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        self.requests
            .lock()
            .expect("mutex poisoned")
            .push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(f) = &self.override_fn {
            if let Some(outcome) = f(request) {
                return outcome;
            }
        }
        self.route(request)
    }
}

pub fn client(api: Arc<FakeApi>) -> ApiClient {
    ApiClient::with_transport(
        ClientConfig::new("client-id", "client-secret").api_url(API_URL),
        api,
    )
}

/// Transport that replays scripted outcomes, then repeats the last one.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response>>>,
    last: Mutex<Option<Response>>,
    received: Mutex<Vec<RequestTemplate>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn always(status: u16) -> Self {
        Self::new(vec![Ok(Response::new(status))])
    }

    pub fn new(script: Vec<Result<Response>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            received: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<RequestTemplate> {
        self.received.lock().expect("mutex poisoned").clone()
    }
}

#[async_trait]
impl Sender for ScriptedTransport {
    async fn send(&self, request: &RequestTemplate) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .expect("mutex poisoned")
            .push(request.clone());

        let next = self.script.lock().expect("mutex poisoned").pop_front();
        match next {
            Some(Ok(response)) => {
                *self.last.lock().expect("mutex poisoned") = Some(response.clone());
                Ok(response)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self
                .last
                .lock()
                .expect("mutex poisoned")
                .clone()
                .unwrap_or_else(|| Response::new(200))),
        }
    }
}

pub fn documents(n: usize) -> Vec<Document> {
    (1..=n)
        .map(|i| Document::from_bytes(format!("file-{i:02}.pdf"), format!("%PDF-{i}")))
        .collect()
}

/// Emits `items`, then fails with a pipeline error.
pub struct FailingSource {
    pub items: Vec<Document>,
}

#[async_trait]
impl Pipe<(), Document> for FailingSource {
    async fn process(
        &self,
        mut input: Receiver<()>,
        output: ChannelSender<Document>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }
        for item in self.items.clone() {
            if output.send(item).await.is_err() {
                return Ok(());
            }
        }
        Err(Error::pipeline("source went away"))
    }
}

/// Emits `items` and then idles until cancelled, like a directory watcher.
pub struct EndlessSource {
    pub items: Vec<Document>,
}

#[async_trait]
impl Pipe<(), Document> for EndlessSource {
    async fn process(
        &self,
        mut input: Receiver<()>,
        output: ChannelSender<Document>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }
        for item in self.items.clone() {
            if output.send(item).await.is_err() {
                return Ok(());
            }
        }
        cancel.cancelled().await;
        Ok(())
    }
}
