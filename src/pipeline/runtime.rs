use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Spawns pipes onto the tokio runtime.
pub struct Runtime {
    buffer: usize,
}

impl Runtime {
    pub fn new() -> Self {
        Self { buffer: 128 }
    }

    /// Capacity of every channel between stages.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Spawn `pipe` and hand back both ends of it.
    ///
    /// Nothing flows until something is sent on the returned input sender.
    pub fn spawn<I, O, P>(
        &self,
        pipe: P,
    ) -> (
        mpsc::Sender<I>,
        mpsc::Receiver<O>,
        CancelToken,
        JoinHandle<Result<()>>,
    )
    where
        I: Send + 'static,
        O: Send + 'static,
        P: Pipe<I, O> + Send + Sync + 'static,
    {
        let (tx_in, rx_in) = mpsc::channel::<I>(self.buffer);
        let (tx_out, rx_out) = mpsc::channel::<O>(self.buffer);

        let buffer = self.buffer;
        let cancel = CancelToken::default();
        let cancel_task = cancel.clone();

        #[cfg(feature = "tracing")]
        let handle = {
            use tracing::Instrument;
            let stage = pipe.stage_name();
            let span = tracing::info_span!("waivepipe.stage", stage = stage, buffer = buffer);
            tokio::spawn(
                async move { pipe.process(rx_in, tx_out, buffer, cancel_task).await }
                    .instrument(span),
            )
        };

        #[cfg(not(feature = "tracing"))]
        let handle =
            tokio::spawn(async move { pipe.process(rx_in, tx_out, buffer, cancel_task).await });

        (tx_in, rx_out, cancel, handle)
    }

    /// Spawn a source-rooted pipe, start it, and feed every output item to
    /// `on_item`. The handle resolves once the pipe and the drain finish.
    pub fn spawn_drained<O, P, F>(&self, pipe: P, mut on_item: F) -> (CancelToken, JoinHandle<Result<()>>)
    where
        O: Send + 'static,
        P: Pipe<(), O> + Send + Sync + 'static,
        F: FnMut(O) + Send + 'static,
    {
        let (tx, mut rx, cancel, handle) = self.spawn(pipe);

        let joined = tokio::spawn(async move {
            // Capacity is at least one, so this cannot block.
            let _ = tx.send(()).await;
            drop(tx);

            while let Some(item) = rx.recv().await {
                on_item(item);
            }
            handle.await?
        });

        (cancel, joined)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
