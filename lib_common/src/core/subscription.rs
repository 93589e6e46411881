//! # Subscriptions
//!
//! A `Subscription` binds a numeric id to one subscriber's outbound channel.
//! The manager never looks behind the [`EventSink`]: it only hands it encoded
//! frames. Sends are fire-and-forget and must not block.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifier of a subscription. Assigned sequentially from 0, never reused.
pub type SubscriptionId = u64;

/// Failure to hand a frame to a subscriber.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side is gone; nothing will ever be delivered again.
    #[error("subscriber channel closed")]
    Closed,
    /// A transient or transport-specific write failure.
    #[error("subscriber write failed: {0}")]
    Write(String),
}

/// The write handle of a push channel.
pub trait EventSink: Send + Sync {
    /// Queues one encoded event frame for delivery.
    fn send_frame(&self, frame: Bytes) -> Result<(), SinkError>;
}

/// The usual sink: the sending half of the channel drained by the HTTP body
/// stream. Unbounded, so a send never waits on a slow client.
impl EventSink for mpsc::UnboundedSender<Bytes> {
    fn send_frame(&self, frame: Bytes) -> Result<(), SinkError> {
        self.send(frame).map_err(|_| SinkError::Closed)
    }
}

/// One live subscriber.
///
/// Cloning is cheap and yields a handle to the same sink, which is how the
/// broadcast loop snapshots the subscriber set before fanning out.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    sink: Arc<dyn EventSink>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, sink: Arc<dyn EventSink>) -> Self {
        Self { id, sink }
    }

    /// The identifier assigned at registration.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Sends one event frame to this subscriber.
    pub fn send_event(&self, frame: &Bytes) -> Result<(), SinkError> {
        log::trace!("Sending update on subscription {}", self.id);
        self.sink.send_frame(frame.clone())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}
