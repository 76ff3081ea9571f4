// src/store/queue.rs

//! Push / transactional-pop queue.
//!
//! `take` hands out a [`Delivery`]. The consumer either commits it (the item
//! is gone for good) or rolls it back (the item becomes visible again).
//! Dropping an unsettled delivery rolls it back, so a consumer that bails
//! out with `?` never loses work.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::warn;

use crate::errors::{EngineError, Result};

#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: Clone + Send + 'static,
{
    /// Append items in order. Either all are enqueued or none.
    async fn write(&self, items: Vec<T>) -> Result<()>;

    /// Wait for the next item and hand it out as an unsettled delivery.
    ///
    /// Fails with [`EngineError::Closed`] once the queue is closed and drained.
    async fn take(&self) -> Result<Delivery<T>>;
}

/// Settles a delivery against the queue it came from.
pub trait DeliveryHandle<T>: Send {
    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>, item: T) -> Result<()>;
}

/// One item popped from a [`Queue`], pending commit or rollback.
pub struct Delivery<T>
where
    T: Clone + Send + 'static,
{
    item: T,
    handle: Option<Box<dyn DeliveryHandle<T>>>,
}

impl<T> Delivery<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(item: T, handle: Box<dyn DeliveryHandle<T>>) -> Self {
        Self {
            item,
            handle: Some(handle),
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    /// Acknowledge the item; it will not be delivered again.
    pub fn commit(mut self) -> Result<T> {
        if let Some(handle) = self.handle.take() {
            handle.commit()?;
        }
        Ok(self.item.clone())
    }

    /// Return the item to the queue for redelivery.
    pub fn rollback(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.rollback(self.item.clone()),
            None => Ok(()),
        }
    }
}

impl<T> Drop for Delivery<T>
where
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.rollback(self.item.clone()) {
                warn!(error = %err, "failed to roll back dropped delivery");
            }
        }
    }
}

impl<T> fmt::Debug for Delivery<T>
where
    T: Clone + Send + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("item", &self.item)
            .field("settled", &self.handle.is_none())
            .finish()
    }
}

struct QueueInner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> QueueInner<T> {
    fn items(&self) -> Result<MutexGuard<'_, VecDeque<T>>> {
        self.items
            .lock()
            .map_err(|_| EngineError::Store("queue lock poisoned".to_string()))
    }

    fn push_back(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        let mut count = 0usize;
        {
            let mut guard = self.items()?;
            for item in items {
                guard.push_back(item);
                count += 1;
            }
        }
        for _ in 0..count {
            self.notify.notify_one();
        }
        Ok(())
    }
}

/// In-memory FIFO [`Queue`] with redelivery on rollback.
///
/// Rolled-back items go to the back of the queue.
pub struct MemoryQueue<T> {
    name: String,
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for MemoryQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> MemoryQueue<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of items currently visible (not counting unsettled deliveries).
    pub fn len(&self) -> usize {
        self.inner.items().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the visible items, front first.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner
            .items()
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pop the front item without waiting, if any.
    pub fn try_take(&self) -> Result<Option<Delivery<T>>> {
        let item = self.inner.items()?.pop_front();
        Ok(item.map(|item| self.delivery(item)))
    }

    /// Stop accepting writes and wake every waiting consumer.
    ///
    /// Items already enqueued are still handed out.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    fn delivery(&self, item: T) -> Delivery<T> {
        Delivery::new(
            item,
            Box::new(MemoryAck {
                inner: Arc::clone(&self.inner),
            }),
        )
    }
}

#[async_trait]
impl<T> Queue<T> for MemoryQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn write(&self, items: Vec<T>) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed(format!("queue '{}'", self.name)));
        }
        self.inner.push_back(items)
    }

    async fn take(&self) -> Result<Delivery<T>> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a write or close that
            // lands in between still wakes us.
            notified.as_mut().enable();

            if let Some(delivery) = self.try_take()? {
                return Ok(delivery);
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(EngineError::Closed(format!("queue '{}'", self.name)));
            }

            notified.await;
        }
    }
}

struct MemoryAck<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> DeliveryHandle<T> for MemoryAck<T>
where
    T: Send + 'static,
{
    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn rollback(self: Box<Self>, item: T) -> Result<()> {
        self.inner.push_back(std::iter::once(item))
    }
}
