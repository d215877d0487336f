use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::client::models::RemoteDocument;
use crate::document::Document;
use crate::error::{Error, Result};

type CreateFn = Arc<dyn Fn(Document) -> BoxFuture<'static, Result<RemoteDocument>> + Send + Sync>;
type DeleteFn = Arc<dyn Fn(RemoteDocument) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type ActionFn =
    Arc<dyn Fn(RemoteDocument) -> BoxFuture<'static, Result<RemoteDocument>> + Send + Sync>;

pub type ErrorHandler = Arc<dyn Fn(&ProcessingError) + Send + Sync>;

/// Lifecycle of one document inside the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Created,
    RemoteResourceCreated,
    ActionsRunning,
    Cleanup,
    Completed,
    Failed,
}

/// One named step applied to a remote document.
#[derive(Clone)]
pub struct Action {
    name: Arc<str>,
    run: ActionFn,
}

impl Action {
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(RemoteDocument) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RemoteDocument>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(move |doc| f(doc).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action. A panic inside it is reported as an error.
    pub async fn apply(&self, doc: RemoteDocument) -> Result<RemoteDocument> {
        let run = self.run.clone();
        AssertUnwindSafe(async move { run(doc).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::pipeline("action panicked")))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("name", &self.name).finish()
    }
}

/// A per-document failure handed to error handlers.
#[derive(Debug)]
pub struct ProcessingError {
    document: Document,
    resource: Option<RemoteDocument>,
    action: Option<String>,
    error: Error,
}

impl ProcessingError {
    pub fn new(document: Document, resource: Option<RemoteDocument>, error: Error) -> Self {
        Self {
            document,
            resource,
            action: None,
            error,
        }
    }

    pub fn in_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The remote document, when one had been created.
    pub fn resource(&self) -> Option<&RemoteDocument> {
        self.resource.as_ref()
    }

    /// Name of the failing action, if an action failed.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Some(action) => write!(
                f,
                "{} failed in `{}`: {}",
                self.document.source_id(),
                action,
                self.error
            ),
            None => write!(f, "{} failed: {}", self.document.source_id(), self.error),
        }
    }
}

/// How a document left the processor.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Every action ran and the remote copy was deleted. Carries the final
    /// results.
    Completed(RemoteDocument),
    /// Error handlers were told why.
    Failed,
}

impl Outcome {
    pub fn state(&self) -> DocumentState {
        match self {
            Self::Completed(_) => DocumentState::Completed,
            Self::Failed => DocumentState::Failed,
        }
    }
}

/// Threads one document through create → actions → delete.
///
/// Holds no per-document state, so one processor serves any number of
/// concurrent `run` calls.
#[derive(Clone)]
pub struct DocumentProcessor {
    create: CreateFn,
    delete: DeleteFn,
    actions: Vec<Action>,
    on_error: Vec<ErrorHandler>,
}

impl DocumentProcessor {
    pub fn new<C, CFut, D, DFut>(create: C, delete: D) -> Self
    where
        C: Fn(Document) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = Result<RemoteDocument>> + Send + 'static,
        D: Fn(RemoteDocument) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            create: Arc::new(move |doc| create(doc).boxed()),
            delete: Arc::new(move |doc| delete(doc).boxed()),
            actions: Vec::new(),
            on_error: Vec::new(),
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn on_error<H>(mut self, handler: H) -> Self
    where
        H: Fn(&ProcessingError) + Send + Sync + 'static,
    {
        self.on_error.push(Arc::new(handler));
        self
    }

    pub(crate) fn error_handlers(mut self, handlers: Vec<ErrorHandler>) -> Self {
        self.on_error.extend(handlers);
        self
    }

    /// Process one document.
    ///
    /// Creation and action failures go to the error handlers and yield
    /// `Ok(Outcome::Failed)`. Whenever a remote document was created it is
    /// deleted exactly once, before handlers run; a failed delete is
    /// returned as [`Error::Cleanup`] even if handlers already saw an action
    /// failure.
    pub async fn run(&self, document: Document) -> Result<Outcome> {
        trace_state(&document, DocumentState::Created);

        let remote = match (self.create)(document.clone()).await {
            Ok(remote) => remote,
            Err(err) => {
                trace_state(&document, DocumentState::Failed);
                self.report(&ProcessingError::new(document, None, err));
                return Ok(Outcome::Failed);
            }
        };
        trace_state(&document, DocumentState::RemoteResourceCreated);

        trace_state(&document, DocumentState::ActionsRunning);
        let mut current = remote;
        let mut failure: Option<(String, Error)> = None;
        for action in &self.actions {
            match action.apply(current.clone()).await {
                Ok(next) => current = next,
                Err(err) => {
                    failure = Some((action.name().to_string(), err));
                    break;
                }
            }
        }

        trace_state(&document, DocumentState::Cleanup);
        let deleted = (self.delete)(current.clone()).await;

        let failed = failure.is_some();
        if let Some((action, err)) = failure {
            trace_state(&document, DocumentState::Failed);
            let report =
                ProcessingError::new(document.clone(), Some(current.clone()), err).in_action(action);
            self.report(&report);
        }

        match deleted {
            Err(err) => {
                if !failed {
                    trace_state(&document, DocumentState::Failed);
                }
                Err(Error::cleanup(current, err))
            }
            Ok(()) if failed => Ok(Outcome::Failed),
            Ok(()) => {
                trace_state(&document, DocumentState::Completed);
                Ok(Outcome::Completed(current))
            }
        }
    }

    pub(crate) fn report(&self, error: &ProcessingError) {
        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::WARN,
            event = "waivepipe.document.error",
            source_id = error.document().source_id(),
            action = error.action(),
            error = %error.error(),
            "waivepipe.document.error"
        );

        for handler in &self.on_error {
            handler(error);
        }
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn trace_state(document: &Document, state: DocumentState) {
    #[cfg(feature = "tracing")]
    tracing::event!(
        tracing::Level::DEBUG,
        event = "waivepipe.document.state",
        source_id = document.source_id(),
        state = ?state,
        "waivepipe.document.state"
    );
}
