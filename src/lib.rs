//! # waivepipe
//!
//! **Concurrency-bounded document classification pipelines in Rust.**
//!
//! `waivepipe` feeds documents to a remote classification/extraction API
//! while keeping three promises:
//!
//! - a bounded number of documents is in flight at any time
//! - transient API failures are retried with exponential backoff
//! - every remote document that gets created also gets deleted, whether
//!   processing succeeded, failed or was cancelled
//!
//! ---
//!
//! ## Core Model
//!
//! ```text
//! Source → RateLimiter → WorkPool → DocumentProcessor
//!                                     create → actions… → delete
//! ```
//!
//! Sources and the rate limiter are [`Pipe`] stages connected by bounded
//! Tokio channels. The work pool runs one task per admitted document; the
//! processor threads the document through its actions and always cleans up.
//!
//! All HTTP goes through a sender chain:
//!
//! ```text
//! logging → retry → timeout translation → failure classification → token injection → transport
//! ```
//!
//! ---
//!
//! ## Example
//!
//! ```no_run
//! use waivepipe::client::{ApiClient, ClientConfig};
//! use waivepipe::pipeline::orchestrator::Pipeline;
//! use waivepipe::source::fs::DirectorySource;
//!
//! #[tokio::main]
//! async fn main() -> waivepipe::error::Result<()> {
//!     let client = ApiClient::new(ClientConfig::new("client-id", "client-secret"));
//!
//!     let handle = Pipeline::new(client)
//!         .with_documents_from(DirectorySource::new("inbox"))
//!         .classify_with("mortgages")
//!         .inspect(|doc| {
//!             if let Some(c) = doc.classification() {
//!                 println!("{} => {}", doc.document().source_id(), c.document_type);
//!             }
//!         })
//!         .on_document_error(|err| eprintln!("{err}"))
//!         .on_pipeline_completed(|| println!("done"))
//!         .start();
//!
//!     handle.join().await
//! }
//! ```
//!
//! ---
//!
//! ## Error Handling Contract
//!
//! - Only [`ApiError`] leaves a sender chain. Transport failures and
//!   timeouts are translated into it, tagged with method and URL.
//! - Transport errors, timeouts, `408` and `5xx` responses are retried up to
//!   8 attempts; other `4xx` responses fail immediately.
//! - Per-document failures reach the `on_document_error` handlers and never
//!   stop the pipeline.
//! - A failing source aborts the pipeline with [`Error::Fatal`].
//!
//! ---
//!
//! ## Cancellation
//!
//! [`PipelineHandle::cancel`] (or dropping the handle) stops admission of new
//! documents. Documents already in the work pool finish and are deleted.
//!
//! ---
//!
//! ## Observability
//!
//! The default `tracing` feature emits structured events such as
//! `waivepipe.request.start`, `waivepipe.request.completed`,
//! `waivepipe.request.failed`, `waivepipe.retry.sleep`,
//! `waivepipe.retry.exhausted`, `waivepipe.token.refresh`,
//! `waivepipe.limiter.admit`, `waivepipe.document.state`,
//! `waivepipe.document.error` and `waivepipe.cancelled`.
//! Nothing is printed unless a subscriber is installed:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("waivepipe=debug")
//!     .init();
//! ```
//!
//! ---
//!
//! [`Pipe`]: pipeline::pipe::Pipe
//! [`ApiError`]: error::ApiError
//! [`Error::Fatal`]: error::Error::Fatal
//! [`PipelineHandle::cancel`]: pipeline::orchestrator::PipelineHandle::cancel

pub mod auth;
pub mod client;
pub mod document;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod source;

pub mod prelude {
    //! Convenient imports for most `waivepipe` users.

    pub use crate::client::models::RemoteDocument;
    pub use crate::client::{ApiClient, ClientConfig};
    pub use crate::document::Document;
    pub use crate::pipeline::cancel::CancelToken;
    pub use crate::pipeline::chain::PipeExt;
    pub use crate::pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
    pub use crate::pipeline::processor::ProcessingError;
    pub use crate::pipeline::runtime::Runtime;
}
