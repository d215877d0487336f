//! Units of work fed into a pipeline.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Lazily opened document content.
///
/// `open` may be called more than once, but callers should not rely on it
/// being cheap.
#[async_trait]
pub trait DocumentContent: Send + Sync {
    async fn open(&self) -> Result<Bytes>;
}

/// A document identified by a stable source id.
///
/// Equality and hashing use the source id only. Cloning is cheap; the
/// content is shared and never mutated.
#[derive(Clone)]
pub struct Document {
    source_id: Arc<str>,
    content: Arc<dyn DocumentContent>,
}

impl Document {
    pub fn new(source_id: impl Into<Arc<str>>, content: Arc<dyn DocumentContent>) -> Self {
        Self {
            source_id: source_id.into(),
            content,
        }
    }

    pub fn from_bytes(source_id: impl Into<Arc<str>>, bytes: impl Into<Bytes>) -> Self {
        Self::new(source_id, Arc::new(InMemory(bytes.into())))
    }

    /// Document read from `path` when opened; the path is the source id.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.to_string_lossy().into_owned();
        Self::new(id, Arc::new(FileContent(path)))
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub async fn open(&self) -> Result<Bytes> {
        self.content.open().await
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.source_id == other.source_id
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_id.hash(state);
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("source_id", &self.source_id)
            .finish_non_exhaustive()
    }
}

struct InMemory(Bytes);

#[async_trait]
impl DocumentContent for InMemory {
    async fn open(&self) -> Result<Bytes> {
        Ok(self.0.clone())
    }
}

struct FileContent(PathBuf);

#[async_trait]
impl DocumentContent for FileContent {
    async fn open(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.0).await?))
    }
}
