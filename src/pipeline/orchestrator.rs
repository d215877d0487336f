use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::client::models::RemoteDocument;
use crate::client::ApiClient;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::chain::Chain;
use crate::pipeline::limiter::{RateLimiter, DEFAULT_MAX_CONCURRENCY, DEFAULT_POLL_INTERVAL};
use crate::pipeline::pipe::Pipe;
use crate::pipeline::pool::WorkPool;
use crate::pipeline::processor::{
    Action, DocumentProcessor, ErrorHandler, Outcome, ProcessingError,
};
use crate::pipeline::runtime::Runtime;

type CompletedHandler = Arc<dyn Fn() + Send + Sync>;
type DocumentSource = Arc<dyn Pipe<(), Document>>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    pub delete_existing_documents: bool,
    pub poll_interval: Duration,
    pub buffer: usize,
}

impl PipelineConfig {
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Delete every remote document before admitting the first new one.
    pub fn delete_existing_documents(mut self, yes: bool) -> Self {
        self.delete_existing_documents = yes;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            delete_existing_documents: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer: 128,
        }
    }
}

/// Document pipeline: source → rate limiter → work pool → processor.
///
/// Build it with the `with_*`/`*_with` methods, then either [`start`] it or
/// spawn it with [`Runtime::spawn`] to receive every completed
/// [`RemoteDocument`] on the output channel.
///
/// Every per-document failure goes to the `on_document_error` handlers and
/// frees the document's slot. Only a failing source (or the startup sweep)
/// aborts the pipeline, with [`Error::Fatal`].
///
/// [`start`]: Pipeline::start
pub struct Pipeline {
    client: ApiClient,
    config: PipelineConfig,
    source: Option<DocumentSource>,
    actions: Vec<Action>,
    on_error: Vec<ErrorHandler>,
    on_completed: Vec<CompletedHandler>,
}

impl Pipeline {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            config: PipelineConfig::default(),
            source: None,
            actions: Vec::new(),
            on_error: Vec::new(),
            on_completed: Vec::new(),
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config = self.config.max_concurrency(n);
        self
    }

    pub fn delete_existing_documents(mut self, yes: bool) -> Self {
        self.config = self.config.delete_existing_documents(yes);
        self
    }

    pub fn with_documents_from<S>(mut self, source: S) -> Self
    where
        S: Pipe<(), Document> + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn classify_with(mut self, classifier: impl Into<String>) -> Self {
        let classifier: Arc<str> = classifier.into().into();
        let client = self.client.clone();
        let name = format!("classify:{classifier}");
        self.actions.push(Action::new(name, move |doc| {
            let client = client.clone();
            let classifier = classifier.clone();
            async move { client.classify(doc, &classifier).await }
        }));
        self
    }

    pub fn extract_with(mut self, extractor: impl Into<String>) -> Self {
        let extractor: Arc<str> = extractor.into().into();
        let client = self.client.clone();
        let name = format!("extract:{extractor}");
        self.actions.push(Action::new(name, move |doc| {
            let client = client.clone();
            let extractor = extractor.clone();
            async move { client.extract(doc, &extractor).await }
        }));
        self
    }

    /// Async transform producing the next value of the document.
    pub fn then<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RemoteDocument) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RemoteDocument>> + Send + 'static,
    {
        self.actions.push(Action::new("then", f));
        self
    }

    /// Sync transform producing the next value of the document.
    pub fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(RemoteDocument) -> RemoteDocument + Send + Sync + 'static,
    {
        self.actions.push(Action::new("map", move |doc| {
            std::future::ready(Ok::<_, Error>(f(doc)))
        }));
        self
    }

    /// Sync side effect; the document passes through unchanged.
    pub fn inspect<F>(mut self, f: F) -> Self
    where
        F: Fn(&RemoteDocument) + Send + Sync + 'static,
    {
        self.actions.push(Action::new("inspect", move |doc| {
            f(&doc);
            std::future::ready(Ok::<_, Error>(doc))
        }));
        self
    }

    /// Handlers run in registration order.
    pub fn on_document_error<H>(mut self, handler: H) -> Self
    where
        H: Fn(&ProcessingError) + Send + Sync + 'static,
    {
        self.on_error.push(Arc::new(handler));
        self
    }

    /// Runs once every admitted document has been deleted remotely. Not
    /// called when the pipeline is cancelled or aborts.
    pub fn on_pipeline_completed<H>(mut self, handler: H) -> Self
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.on_completed.push(Arc::new(handler));
        self
    }

    /// Start consuming the source in the background.
    pub fn start(self) -> PipelineHandle {
        let runtime = Runtime::new().buffer(self.config.buffer);
        let (cancel, join) = runtime.spawn_drained(self, |_done: RemoteDocument| {});
        PipelineHandle {
            cancel,
            join: Some(join),
        }
    }

    fn processor(&self) -> DocumentProcessor {
        let create_client = self.client.clone();
        let delete_client = self.client.clone();
        DocumentProcessor::new(
            move |doc: Document| {
                let client = create_client.clone();
                async move { client.create_document(&doc).await }
            },
            move |remote: RemoteDocument| {
                let client = delete_client.clone();
                async move { client.delete_document(remote.id()).await }
            },
        )
        .actions(self.actions.iter().cloned())
        .error_handlers(self.on_error.clone())
    }
}

#[async_trait]
impl Pipe<(), RemoteDocument> for Pipeline {
    fn stage_name(&self) -> &'static str {
        "pipeline"
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<RemoteDocument>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let Some(source) = self.source.clone() else {
            return Err(Error::fatal(Error::pipeline("no document source configured")));
        };

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        if self.config.delete_existing_documents {
            self.client
                .delete_all_documents()
                .await
                .map_err(Error::fatal)?;
        }

        let max = self.config.max_concurrency;
        let limiter = RateLimiter::with_poll_interval(max, self.config.poll_interval);
        let pool = WorkPool::new(max);
        let processor = self.processor();

        let admission = Chain::<_, _, Document>::new(source, limiter.clone());
        let (start_tx, start_rx) = mpsc::channel::<()>(1);
        let (admit_tx, mut admit_rx) = mpsc::channel::<Document>(buffer.max(1));
        let _ = start_tx.send(()).await;
        drop(start_tx);

        let upstream = admission.process(start_rx, admit_tx, buffer, cancel.clone());

        let dispatch = async {
            while let Some(document) = admit_rx.recv().await {
                let slot = SlotGuard(limiter.clone());
                let processor = processor.clone();
                let output = output.clone();

                pool.submit(async move {
                    let outcome = processor.run(document.clone()).await;
                    // The remote copy is gone by now; free admission first.
                    drop(slot);
                    match outcome {
                        Ok(Outcome::Completed(remote)) => {
                            let _ = output.send(remote).await;
                        }
                        Ok(Outcome::Failed) => {}
                        Err(err) => {
                            let resource = err.cleanup_resource().cloned();
                            processor.report(&ProcessingError::new(document, resource, err));
                        }
                    }
                })
                .await?;
            }
            Ok::<(), Error>(())
        };

        let (upstream_res, dispatch_res) = tokio::join!(upstream, dispatch);

        pool.wait_idle().await;
        pool.close();

        if let Err(err) = upstream_res {
            #[cfg(feature = "tracing")]
            tracing::event!(tracing::Level::ERROR, event = "waivepipe.pipeline.aborted", error = %err, "waivepipe.pipeline.aborted");
            return Err(Error::fatal(err));
        }
        dispatch_res?;

        if cancel.is_cancelled() {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::event!(tracing::Level::INFO, event = "waivepipe.pipeline.completed", "waivepipe.pipeline.completed");

        for handler in &self.on_completed {
            handler();
        }
        Ok(())
    }
}

/// Returns a rate-limiter slot when the document's task ends, however it
/// ends.
struct SlotGuard(RateLimiter);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.release_slot();
    }
}

/// Handle to a started pipeline.
///
/// Dropping the handle cancels the pipeline: no new documents are admitted,
/// while documents already in flight finish (and are deleted) normally.
pub struct PipelineHandle {
    cancel: CancelToken,
    join: Option<JoinHandle<Result<()>>>,
}

impl PipelineHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Wait for the pipeline to finish without cancelling it.
    pub async fn join(mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join.await?,
            None => Ok(()),
        }
    }

    /// Cancel, then wait for in-flight documents to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancel();
        self.join().await
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
