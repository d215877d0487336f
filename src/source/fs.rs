use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::document::Document;
use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Every regular file directly inside a directory, in name order.
///
/// Files are not read here; each [`Document`] opens its file when the
/// pipeline uploads it.
pub struct DirectorySource {
    path: PathBuf,
}

impl DirectorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Pipe<(), Document> for DirectorySource {
    fn stage_name(&self) -> &'static str {
        "directory_source"
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

        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        for path in files {
            if cancel.is_cancelled() {
                break;
            }
            if output.send(Document::from_path(path)).await.is_err() {
                #[cfg(feature = "tracing")]
                tracing::event!(tracing::Level::INFO, event = "waivepipe.downstream.closed", stage = "directory_source", "waivepipe.downstream.closed");
                break;
            }
        }
        Ok(())
    }
}
