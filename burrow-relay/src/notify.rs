//! Outbound notification delivery.
//!
//! Every event the server pushes to a peer goes through a [`Notifier`].
//! Delivery is fire-and-forget: no acknowledgement, no retry, no ordering
//! across recipients. Callers collect target handles under a registry lock
//! and deliver after releasing it.

use burrow_types::{ChannelId, ServerEvent};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::server::RelayMetrics;

/// Handle to one persistent channel.
///
/// Cloning is cheap. The channel itself is owned by the WebSocket task;
/// once that task ends, sends through stale handles fail and are dropped.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ChannelId,
    tx: mpsc::Sender<ServerEvent>,
}

impl ChannelHandle {
    /// Create a bounded outbound queue for a new channel.
    ///
    /// Returns the handle and the receiving end drained by the socket writer.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ChannelId::new(),
                tx,
            },
            rx,
        )
    }

    /// Identity of the underlying channel.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// True once the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn try_send(&self, event: ServerEvent) -> Result<(), mpsc::error::TrySendError<ServerEvent>> {
        self.tx.try_send(event)
    }
}

/// Delivery seam for outbound events.
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver one event. Returns `false` if it was dropped.
    ///
    /// Must never block.
    fn deliver(&self, channel: &ChannelHandle, event: ServerEvent) -> bool;

    /// Deliver the same event to several channels.
    ///
    /// Returns the number of channels that accepted it.
    fn broadcast(&self, channels: &[ChannelHandle], event: &ServerEvent) -> usize {
        channels
            .iter()
            .filter(|channel| self.deliver(channel, event.clone()))
            .count()
    }
}

/// Fire-and-forget delivery over each channel's bounded queue.
///
/// A full queue or a closed channel drops the event.
#[derive(Debug)]
pub struct ChannelNotifier {
    metrics: Arc<RelayMetrics>,
}

impl ChannelNotifier {
    /// Create a notifier that counts dropped events in `metrics`.
    pub fn new(metrics: Arc<RelayMetrics>) -> Self {
        Self { metrics }
    }
}

impl Notifier for ChannelNotifier {
    fn deliver(&self, channel: &ChannelHandle, event: ServerEvent) -> bool {
        match channel.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                self.metrics
                    .notifications_dropped
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Dropped event for channel {:?}: {}", channel.id(), e);
                false
            }
        }
    }
}
