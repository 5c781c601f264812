//! Bounded single-producer / single-consumer queue with an explicit
//! end-of-stream marker.
//!
//! Built on a `crossbeam_channel::bounded` channel. The two halves are not
//! `Clone`, so each queue has exactly one producer and one consumer.
//!
//! - Ordinary items go in with [`QueueSender::try_put`], which never blocks
//!   and hands the item back when the queue is full.
//! - [`QueueSender::close`] consumes the sender and blocks until the
//!   [`QueueItem::EndOfStream`] marker is enqueued, so nothing can follow the
//!   marker and a second marker cannot be sent.
//! - A sender dropped without `close` shows up on the receiving side as
//!   [`PipelineError::QueueDisconnected`], never as a clean end of stream.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, Sender, TrySendError,
};
use std::time::Duration;

/// Element carried by a pipeline queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem<T> {
    Item(T),
    EndOfStream,
}

impl<T> QueueItem<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, QueueItem::EndOfStream)
    }
}

/// Why a non-blocking put failed. The rejected item is handed back.
#[derive(Debug, PartialEq)]
pub enum PutError<T> {
    Full(T),
    Disconnected(T),
}

impl<T> PutError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(item) | PutError::Disconnected(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PutError::Full(_))
    }
}

/// Create a queue pair: `(producer_half, consumer_half)`.
pub fn bounded_queue<T>(
    name: &'static str,
    capacity: usize,
) -> PipelineResult<(QueueSender<T>, QueueReceiver<T>)> {
    if capacity == 0 {
        return Err(PipelineError::InvalidConfig(format!(
            "queue '{}' needs a capacity of at least 1",
            name
        )));
    }

    let (tx, rx) = bounded(capacity);
    Ok((
        QueueSender { name, tx },
        QueueReceiver {
            name,
            rx,
            finished: false,
        },
    ))
}

/// Producer half of a pipeline queue.
pub struct QueueSender<T> {
    name: &'static str,
    tx: Sender<QueueItem<T>>,
}

impl<T> QueueSender<T> {
    /// Enqueue without blocking.
    pub fn try_put(&self, item: T) -> Result<(), PutError<T>> {
        match self.tx.try_send(QueueItem::Item(item)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(QueueItem::Item(item))) => Err(PutError::Full(item)),
            Err(TrySendError::Disconnected(QueueItem::Item(item))) => {
                Err(PutError::Disconnected(item))
            }
            // Only `Item`s are sent through this path.
            Err(_) => unreachable!("try_put returned a value it never sent"),
        }
    }

    /// Block until the end-of-stream marker is enqueued.
    pub fn close(self) -> PipelineResult<()> {
        self.tx
            .send(QueueItem::EndOfStream)
            .map_err(|_| PipelineError::QueueDisconnected(self.name))?;
        tracing::trace!(queue = self.name, "end-of-stream enqueued");
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Consumer half of a pipeline queue.
pub struct QueueReceiver<T> {
    name: &'static str,
    rx: Receiver<QueueItem<T>>,
    finished: bool,
}

impl<T> QueueReceiver<T> {
    /// Block until the next item or the end-of-stream marker arrives.
    pub fn get(&mut self) -> PipelineResult<QueueItem<T>> {
        if self.finished {
            return Err(PipelineError::AfterEndOfStream(self.name));
        }
        match self.rx.recv() {
            Ok(item) => Ok(self.observe(item)),
            Err(_) => Err(PipelineError::QueueDisconnected(self.name)),
        }
    }

    /// Like [`get`](Self::get) but gives up after `timeout`.
    pub fn get_timeout(&mut self, timeout: Duration) -> PipelineResult<QueueItem<T>> {
        if self.finished {
            return Err(PipelineError::AfterEndOfStream(self.name));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(self.observe(item)),
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::Timeout(self.name)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PipelineError::QueueDisconnected(self.name))
            }
        }
    }

    fn observe(&mut self, item: QueueItem<T>) -> QueueItem<T> {
        if item.is_end_of_stream() {
            self.finished = true;
        }
        item
    }

    /// True once the end-of-stream marker has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }
}
