use serde::Deserialize;

use crate::document::Document;

/// Server-side counterpart of a [`Document`].
///
/// Updates are functional: `with_*` consumes the value and returns a new one.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    id: String,
    document: Document,
    classification: Option<ClassificationResult>,
    extraction: Option<ExtractionResult>,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>, document: Document) -> Self {
        Self {
            id: id.into(),
            document,
            classification: None,
            extraction: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn classification(&self) -> Option<&ClassificationResult> {
        self.classification.as_ref()
    }

    pub fn extraction(&self) -> Option<&ExtractionResult> {
        self.extraction.as_ref()
    }

    pub fn with_classification(mut self, classification: ClassificationResult) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionResult) -> Self {
        self.extraction = Some(extraction);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassificationResult {
    pub document_type: String,
    #[serde(default)]
    pub relative_confidence: f64,
    #[serde(default)]
    pub is_confident: bool,
    #[serde(default)]
    pub document_type_scores: Vec<DocumentTypeScore>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentTypeScore {
    pub document_type: String,
    pub score: f64,
}

/// Raw extraction payload as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionResult(pub serde_json::Value);

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedDocument {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyResponse {
    pub classification: ClassificationResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentList {
    #[serde(default)]
    pub documents: Vec<CreatedDocument>,
}
