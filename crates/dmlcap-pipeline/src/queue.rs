use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, SendTimeoutError};

use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};

/// How long a blocked push or pop waits before re-checking cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a queue operation gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The other side was dropped.
    Closed,
    /// The run was cancelled while waiting.
    Cancelled,
}

/// Create a FIFO queue holding at most `capacity` items.
///
/// `push` blocks while the queue is full and `pop` blocks while it is empty.
/// Dropping the sender closes the queue; the receiver still drains whatever
/// is left before reporting the end.
pub fn bounded<T>(
    capacity: usize,
    cancel: &CancellationToken,
) -> Result<(QueueSender<T>, QueueReceiver<T>)> {
    if capacity == 0 {
        return Err(PipelineError::InvalidCapacity(capacity));
    }

    let (tx, rx) = channel::bounded(capacity);
    Ok((
        QueueSender {
            inner: tx,
            cancel: cancel.clone(),
        },
        QueueReceiver {
            inner: rx,
            cancel: cancel.clone(),
        },
    ))
}

/// Producer half of a bounded queue.
pub struct QueueSender<T> {
    inner: channel::Sender<T>,
    cancel: CancellationToken,
}

impl<T> QueueSender<T> {
    /// Enqueue an item, waiting for space.
    pub fn push(&self, item: T) -> std::result::Result<(), QueueError> {
        let mut item = item;
        loop {
            if self.cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            match self.inner.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(QueueError::Closed),
            }
        }
    }
}

/// Consumer half of a bounded queue.
pub struct QueueReceiver<T> {
    inner: channel::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> QueueReceiver<T> {
    /// Dequeue the oldest item, waiting for one to arrive.
    ///
    /// Returns `Ok(None)` once the sender is gone and the queue is drained.
    pub fn pop(&self) -> std::result::Result<Option<T>, QueueError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            match self.inner.recv_timeout(POLL_INTERVAL) {
                Ok(item) => return Ok(Some(item)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }

    /// Items currently waiting.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().unwrap_or(0)
    }
}
