use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::document::Document;
use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Finite source over documents known up front.
///
/// The documents are handed out once; processing the same source a second
/// time yields nothing.
pub struct IterSource {
    documents: Mutex<Option<Vec<Document>>>,
}

impl IterSource {
    pub fn new(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            documents: Mutex::new(Some(documents.into_iter().collect())),
        }
    }
}

#[async_trait]
impl Pipe<(), Document> for IterSource {
    fn stage_name(&self) -> &'static str {
        "iter_source"
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<Document>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        let documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .unwrap_or_default();

        for document in documents {
            if cancel.is_cancelled() {
                break;
            }
            if output.send(document).await.is_err() {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::INFO, event = "waivepipe.downstream.closed", stage = "iter_source", "waivepipe.downstream.closed");
                break;
            }
        }
        Ok(())
    }
}
