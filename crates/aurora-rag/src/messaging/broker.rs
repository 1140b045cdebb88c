//! In-process message broker with named queues and reply destinations
//!
//! Each queue is a bounded tokio channel with a single consumer. Publishers
//! get back the assigned message id; consumers receive [`Delivery`] values
//! carrying it together with the optional reply queue name.
//!
//! Reply queues are owned by whoever asked for them: [`MessageBroker::publish_reply`]
//! never creates one, and closing the broker leaves them in place until the
//! owner deletes them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};

const REPLY_PREFIX: &str = "reply.";

/// A message handed to a consumer
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker-assigned message id
    pub message_id: String,
    /// Raw message body
    pub body: Bytes,
    /// Queue the consumer should publish its reply to
    pub reply_to: Option<String>,
    /// Publish time
    pub published_at: DateTime<Utc>,
}

struct Queue {
    sender: mpsc::Sender<Delivery>,
    receiver: Mutex<Option<mpsc::Receiver<Delivery>>>,
}

/// Receiving end of one queue
pub struct Subscription {
    queue: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    /// Queue this subscription reads from
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Next delivery; `None` once the queue is deleted or the broker closed
    /// and every buffered message has been received
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

async fn deliver(
    queue: &str,
    sender: mpsc::Sender<Delivery>,
    body: Bytes,
    reply_to: Option<String>,
) -> Result<String> {
    let delivery = Delivery {
        message_id: Uuid::new_v4().to_string(),
        body,
        reply_to,
        published_at: Utc::now(),
    };
    let message_id = delivery.message_id.clone();

    sender
        .send(delivery)
        .await
        .map_err(|_| Error::internal(format!("queue '{}' has been closed", queue)))?;

    tracing::trace!("Published {} to '{}'", message_id, queue);
    Ok(message_id)
}

/// Named-queue broker
pub struct MessageBroker {
    queues: DashMap<String, Queue>,
    capacity: usize,
    closed: AtomicBool,
}

impl MessageBroker {
    /// Create a broker whose queues buffer `capacity` messages each
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::internal("message broker is closed"));
        }
        Ok(())
    }

    /// Create `name` if it does not exist yet
    pub fn declare(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.queues.entry(name.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(self.capacity);
            tracing::debug!("Declared queue '{}'", name);
            Queue {
                sender,
                receiver: Mutex::new(Some(receiver)),
            }
        });
        Ok(())
    }

    /// Publish `body` to `queue`, declaring it if needed; waits while the queue is full
    pub async fn publish(
        &self,
        queue: &str,
        body: impl Into<Bytes>,
        reply_to: Option<String>,
    ) -> Result<String> {
        self.declare(queue)?;
        let sender = self
            .queues
            .get(queue)
            .map(|q| q.sender.clone())
            .ok_or_else(|| Error::internal(format!("queue '{}' disappeared", queue)))?;

        deliver(queue, sender, body.into(), reply_to).await
    }

    /// Publish to an existing reply queue.
    ///
    /// Fails without creating anything when the queue is gone, e.g. because
    /// the asker stopped waiting. Still works while the broker drains after `close`.
    pub async fn publish_reply(&self, queue: &str, body: impl Into<Bytes>) -> Result<String> {
        let sender = self
            .queues
            .get(queue)
            .map(|q| q.sender.clone())
            .ok_or_else(|| Error::internal(format!("reply queue '{}' no longer exists", queue)))?;

        deliver(queue, sender, body.into(), None).await
    }

    /// Take the single consumer end of `queue`
    pub fn subscribe(&self, queue: &str) -> Result<Subscription> {
        self.declare(queue)?;
        let receiver = self
            .queues
            .get(queue)
            .and_then(|q| {
                let receiver = q.receiver.lock().take();
                receiver
            })
            .ok_or_else(|| {
                Error::internal(format!("queue '{}' already has a consumer", queue))
            })?;

        Ok(Subscription {
            queue: queue.to_string(),
            receiver,
        })
    }

    /// Declare a private, uniquely named queue for replies and subscribe to it
    pub fn reply_queue(&self) -> Result<Subscription> {
        let name = format!("{}{}", REPLY_PREFIX, Uuid::new_v4());
        self.declare(&name)?;
        self.subscribe(&name)
    }

    /// Delete a queue; its consumer sees the end of the stream after draining
    pub fn delete(&self, queue: &str) {
        self.queues.remove(queue);
    }

    /// Whether `queue` is currently declared
    pub fn has_queue(&self, queue: &str) -> bool {
        self.queues.contains_key(queue)
    }

    /// Number of declared queues
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Stop accepting publishes and end every work queue subscription once
    /// drained; reply queues stay until their owners delete them
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!("Closing message broker ({} queues)", self.queues.len());
            self.queues.retain(|name, _| name.starts_with(REPLY_PREFIX));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
