//! FIFO value channels connecting programs.
//!
//! A [`Channel`] is a cheaply clonable handle to a shared, unbounded queue.
//! Cloning the handle aliases the queue, which is how one program's output
//! becomes another program's input.
//!
//! Two consumption disciplines are offered:
//! - [`Channel::try_recv`] probes without waiting (cooperative drivers).
//! - [`Channel::recv`] parks the calling task until a value arrives or the
//!   channel is closed (concurrent pipelines).

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::memory::Value;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Queue {
    values: VecDeque<Value>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    queue: Mutex<Queue>,
    notify: Notify,
}

/// Shared unbounded FIFO of [`Value`]s.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Creates a new empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel pre-filled with `values`.
    pub fn with_values(values: impl IntoIterator<Item = Value>) -> Self {
        let channel = Self::new();
        for value in values {
            channel.send(value);
        }
        channel
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a value and wakes any task waiting in [`recv`](Self::recv).
    pub fn send(&self, value: Value) {
        self.lock().values.push_back(value);
        self.inner.notify.notify_waiters();
    }

    /// Pops the oldest value without waiting.
    pub fn try_recv(&self) -> Option<Value> {
        self.lock().values.pop_front()
    }

    /// Pops the oldest value, waiting until one is available.
    ///
    /// Returns [`VMError::ChannelClosed`] once the channel is closed and empty.
    pub async fn recv(&self) -> Result<Value, VMError> {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            // Register before checking the queue so a concurrent send cannot be missed.
            notified.as_mut().enable();
            {
                let mut queue = self.lock();
                if let Some(value) = queue.values.pop_front() {
                    return Ok(value);
                }
                if queue.closed {
                    return Err(VMError::ChannelClosed);
                }
            }
            notified.await;
        }
    }

    /// Closes the channel, waking every waiting receiver.
    ///
    /// Queued values remain readable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values.is_empty()
    }

    /// Removes and returns every queued value in FIFO order.
    pub fn drain(&self) -> Vec<Value> {
        self.lock().values.drain(..).collect()
    }

    /// Returns `true` if both handles alias the same queue.
    pub fn same_channel(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
