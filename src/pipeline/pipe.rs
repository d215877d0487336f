use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;

/// A stage connected to its neighbours by bounded channels.
///
/// Returning drops `output`, which is how a stage signals completion
/// downstream. An `Err` is fatal to the whole pipeline.
#[async_trait]
pub trait Pipe<I: Send + 'static, O: Send + 'static>: Send + Sync {
    fn stage_name(&self) -> &'static str {
        "stage"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()>;
}

#[async_trait]
impl<I, O, P> Pipe<I, O> for std::sync::Arc<P>
where
    I: Send + 'static,
    O: Send + 'static,
    P: Pipe<I, O> + ?Sized,
{
    fn stage_name(&self) -> &'static str {
        (**self).stage_name()
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        (**self).process(input, output, buffer, cancel).await
    }
}
