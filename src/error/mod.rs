use thiserror::Error;

use crate::client::models::RemoteDocument;
use crate::http::request::{Method, RequestTemplate};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("pipeline error: {context}")]
    Pipeline { context: &'static str },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to delete remote document {id}: {source}")]
    Cleanup {
        id: String,
        resource: Box<RemoteDocument>,
        #[source]
        source: Box<Error>,
    },

    #[error("pipeline aborted: {source}")]
    Fatal {
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn pipeline(context: &'static str) -> Self {
        Self::Pipeline { context }
    }

    pub fn cleanup(resource: RemoteDocument, source: Error) -> Self {
        Self::Cleanup {
            id: resource.id().to_string(),
            resource: Box::new(resource),
            source: Box::new(source),
        }
    }

    pub fn fatal(source: Error) -> Self {
        match source {
            fatal @ Self::Fatal { .. } => fatal,
            other => Self::Fatal {
                source: Box::new(other),
            },
        }
    }

    /// Wrap an arbitrary error raised by a user transform.
    pub fn custom<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Custom(err.into())
    }

    /// The typed API error at the root of this error, if any.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            Self::Cleanup { source, .. } | Self::Fatal { source } => {
                source.as_api_error()
            }
            _ => None,
        }
    }

    /// The remote document left behind by a failed delete.
    pub fn cleanup_resource(&self) -> Option<&RemoteDocument> {
        match self {
            Self::Cleanup { resource, .. } => Some(resource.as_ref()),
            _ => None,
        }
    }

    /// Translate any error into the API error vocabulary used at the
    /// boundary of a sender chain.
    pub fn into_api_error(self, request: &RequestTemplate) -> ApiError {
        match self {
            Self::Api(err) => err,
            Self::Transport(err) => err.into_api_error(),
            other => ApiError::Transport {
                method: request.method(),
                url: request.url().to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// The single error kind that crosses the boundary of a sender chain.
///
/// Cloneable so one failed token refresh can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: Method,
        url: String,
        message: String,
    },

    #[error("{method} {url} timed out")]
    Timeout { method: Method, url: String },

    #[error("remote API error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("remote API returned {status} {reason}")]
    Status { status: u16, reason: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Transport failures, timeouts, `408` and `5xx` responses are worth
    /// another attempt. Every other `4xx` is final.
    pub fn is_retryable(&self) -> bool {
        match self.status() {
            None => true,
            Some(status) => status == 408 || status >= 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Cancelled,
    Other,
}

/// Failure raised by a raw transport before any response was received.
#[derive(Error, Debug, Clone)]
#[error("transport error ({kind:?}) on {method} {url}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub method: Method,
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(
        kind: TransportErrorKind,
        request: &RequestTemplate,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            method: request.method(),
            url: request.url().to_string(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout | TransportErrorKind::Cancelled
        )
    }

    pub fn into_api_error(self) -> ApiError {
        if self.is_timeout() {
            ApiError::Timeout {
                method: self.method,
                url: self.url,
            }
        } else {
            ApiError::Transport {
                method: self.method,
                url: self.url,
                message: self.message,
            }
        }
    }
}
