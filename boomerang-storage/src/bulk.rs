//! `BulkProcessor<T>`: turns a stream of independent write requests into
//! batched calls to a user-supplied flush function, while each caller still
//! observes its own batch's result synchronously.
//!
//! Ported from the reference `BulkProcessor[T]` (a channel-fed worker
//! goroutine with per-item result channels): one `Add` item is a
//! `(T, oneshot::Sender<Result<()>>)` pair pushed onto an `mpsc` channel;
//! a single spawned task accumulates a batch, flushes it once, and fans the
//! single result out to every collected sender.

use std::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::Duration,
};

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

type FlushFn<T> = Arc<dyn Fn(Vec<T>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

struct Task<T> {
    item: T,
    reply: oneshot::Sender<Result<()>>,
}

/// Generic size-or-time batch coalescer.
///
/// Construct with [`BulkProcessor::new`], call [`BulkProcessor::add`] from
/// any number of concurrent callers, and [`BulkProcessor::shutdown`] once to
/// drain and stop the worker.
pub struct BulkProcessor<T: Send + 'static> {
    sender: tokio::sync::Mutex<Option<mpsc::Sender<Task<T>>>>,
    shutting_down: Arc<AtomicBool>,
    worker: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T: Send + 'static> BulkProcessor<T> {
    /// `flush` is called with at most `max_batch_size` items, at most once
    /// per batch, and must not panic.
    pub fn new<F, Fut>(queue_capacity: usize, max_batch_size: usize, max_wait: Duration, flush: F) -> Self
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let flush: FlushFn<T> = Arc::new(move |items| Box::pin(flush(items)));
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let shutting_down = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(Self::run(receiver, max_batch_size, max_wait, flush));

        Self {
            sender: tokio::sync::Mutex::new(Some(sender)),
            shutting_down,
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Enqueue `item`, blocking the caller until the batch it lands in has
    /// been flushed, and returning that batch's result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the processor is shutting down or has
    /// already stopped.
    pub async fn add(&self, item: T) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }

        let sender = self.sender.lock().await.clone().ok_or(Error::Shutdown)?;

        let (reply, rx) = oneshot::channel();
        sender.send(Task { item, reply }).await.map_err(|_| Error::Shutdown)?;

        rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Refuse new `add`s, drain the in-flight queue (flushing remaining
    /// items), and wait for the worker to exit.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        // Dropping our held sender lets the worker's receiver loop drain
        // whatever is already queued and then return `None`, ending `run`,
        // as long as no in-flight `add` is still holding its own clone.
        self.sender.lock().await.take();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn run(
        mut receiver: mpsc::Receiver<Task<T>>,
        max_batch_size: usize,
        max_wait: Duration,
        flush: FlushFn<T>,
    ) {
        loop {
            let mut batch = Vec::with_capacity(max_batch_size);
            let mut replies = Vec::with_capacity(max_batch_size);

            let Some(first) = receiver.recv().await else {
                return;
            };
            batch.push(first.item);
            replies.push(first.reply);

            let deadline = tokio::time::sleep(max_wait);
            tokio::pin!(deadline);

            while batch.len() < max_batch_size {
                tokio::select! {
                    biased;
                    next = receiver.recv() => {
                        match next {
                            Some(task) => {
                                batch.push(task.item);
                                replies.push(task.reply);
                            }
                            None => break,
                        }
                    }
                    () = &mut deadline => break,
                }
            }

            let result = flush(batch).await;
            for reply in replies {
                let _ = reply.send(result.clone());
            }
        }
    }
}
