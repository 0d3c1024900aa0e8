//! Relay session management.
//!
//! When two peers cannot negotiate a direct path, file chunks flow through a
//! relay session on the server. A session only tracks chunk forwarding; the
//! transfer status lives in [`crate::transfers`] and is kept consistent by
//! the peers themselves.
//!
//! ## Undeliverable chunks
//!
//! If the receiver has no reachable channel, [`RelaySessionManager::forward_chunk`]
//! reports [`ForwardOutcome::Queued`]. Nothing is buffered: the chunk is
//! dropped and will never be redelivered. Senders that see `Queued` must
//! resend once the receiver is back.

use burrow_types::{PeerRef, RelayStatus, ServerEvent, SessionId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{RelayError, Result};
use crate::notify::Notifier;
use crate::peers::PeerRegistry;
use crate::server::RelayMetrics;

/// A server-mediated chunk path between two peers.
#[derive(Debug, Clone, Serialize)]
pub struct RelaySession {
    /// Session identifier.
    pub session_id: SessionId,
    /// Peer sending chunks.
    pub sender_peer_id: PeerRef,
    /// Peer receiving chunks. May name no registered peer.
    pub receiver_peer_id: PeerRef,
    /// Forwarding progress.
    pub status: RelayStatus,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
}

/// Result of forwarding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The chunk was handed to the receiver's channel.
    Delivered,
    /// The receiver is unreachable. The chunk was not buffered.
    Queued,
}

/// Registry of relay sessions.
#[derive(Debug)]
pub struct RelaySessionManager {
    sessions: DashMap<SessionId, RelaySession>,
    peers: Arc<PeerRegistry>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<RelayMetrics>,
}

impl RelaySessionManager {
    /// Create an empty manager.
    pub fn new(
        peers: Arc<PeerRegistry>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            peers,
            notifier,
            metrics,
        }
    }

    /// Open a relay session. Always succeeds.
    pub fn open(
        &self,
        sender_peer_id: impl Into<PeerRef>,
        receiver_peer_id: impl Into<PeerRef>,
    ) -> SessionId {
        let sender_peer_id = sender_peer_id.into();
        let receiver_peer_id = receiver_peer_id.into();
        let session_id = SessionId::new();
        tracing::info!(
            "Relay session {} opened: {} -> {}",
            session_id,
            sender_peer_id,
            receiver_peer_id
        );
        self.sessions.insert(
            session_id,
            RelaySession {
                session_id,
                sender_peer_id,
                receiver_peer_id,
                status: RelayStatus::Initiated,
                created_at: Utc::now(),
            },
        );
        self.metrics
            .relay_sessions_opened
            .fetch_add(1, Ordering::Relaxed);

        session_id
    }

    /// Forward one chunk to the session's receiver.
    ///
    /// Delivering the chunk with `index == total - 1` completes the session.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown session, `InvalidInput` if `index` is not
    /// below `total`.
    pub async fn forward_chunk(
        &self,
        session_id: &SessionId,
        chunk: serde_json::Value,
        index: u64,
        total: u64,
    ) -> Result<ForwardOutcome> {
        let receiver = self
            .sessions
            .get(session_id)
            .map(|session| session.receiver_peer_id.clone())
            .ok_or_else(|| RelayError::not_found("relay session", session_id))?;

        if index >= total {
            return Err(RelayError::InvalidInput(format!(
                "chunk index {} out of range for {} chunks",
                index, total
            )));
        }

        let Some(channel) = self.peers.reachable_ref(&receiver).await else {
            self.metrics.chunks_queued.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Relay {}: receiver {} unreachable, chunk {}/{} not delivered",
                session_id,
                receiver,
                index + 1,
                total
            );
            return Ok(ForwardOutcome::Queued);
        };

        let delivered = self.notifier.deliver(
            &channel,
            ServerEvent::RelayChunk {
                session_id: *session_id,
                chunk,
                index,
                total,
            },
        );
        if !delivered {
            self.metrics.chunks_queued.fetch_add(1, Ordering::Relaxed);
            return Ok(ForwardOutcome::Queued);
        }
        self.metrics.chunks_forwarded.fetch_add(1, Ordering::Relaxed);

        if let Some(mut session) = self.sessions.get_mut(session_id) {
            if index == total - 1 {
                session.status = RelayStatus::Completed;
                tracing::info!("Relay session {} completed ({} chunks)", session_id, total);
            } else if session.status == RelayStatus::Initiated {
                session.status = RelayStatus::Relaying;
            }
        }

        Ok(ForwardOutcome::Delivered)
    }

    /// Snapshot of one session.
    pub fn get(&self, session_id: &SessionId) -> Option<RelaySession> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// Number of sessions ever opened and still tracked.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no session is tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelHandle, ChannelNotifier};
    use burrow_types::PeerId;
    use serde_json::json;

    fn manager() -> (RelaySessionManager, Arc<PeerRegistry>) {
        let peers = Arc::new(PeerRegistry::new());
        let metrics = Arc::new(RelayMetrics::default());
        let notifier = Arc::new(ChannelNotifier::new(metrics.clone()));
        (
            RelaySessionManager::new(peers.clone(), notifier, metrics),
            peers,
        )
    }

    #[tokio::test]
    async fn open_starts_initiated() {
        let (relays, _) = manager();
        let session_id = relays.open(PeerId::new(), PeerId::new());

        let session = relays.get(&session_id).unwrap();
        assert_eq!(session.status, RelayStatus::Initiated);
        assert_eq!(relays.len(), 1);
    }

    #[tokio::test]
    async fn chunks_reach_receiver_and_last_completes() {
        let (relays, peers) = manager();
        let sender = peers.register("u1", None).await;
        let receiver = peers.register("u2", None).await;
        let (handle, mut rx) = ChannelHandle::new(8);
        peers.attach_channel(&receiver, handle).await.unwrap();

        let session_id = relays.open(sender, receiver);

        let first = relays
            .forward_chunk(&session_id, json!("AAEC"), 0, 2)
            .await
            .unwrap();
        assert_eq!(first, ForwardOutcome::Delivered);
        assert_eq!(relays.get(&session_id).unwrap().status, RelayStatus::Relaying);

        let last = relays
            .forward_chunk(&session_id, json!("AwQF"), 1, 2)
            .await
            .unwrap();
        assert_eq!(last, ForwardOutcome::Delivered);
        assert_eq!(relays.get(&session_id).unwrap().status, RelayStatus::Completed);

        match rx.recv().await.unwrap() {
            ServerEvent::RelayChunk {
                session_id: got,
                chunk,
                index,
                total,
            } => {
                assert_eq!(got, session_id);
                assert_eq!(chunk, json!("AAEC"));
                assert_eq!((index, total), (0, 2));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn single_chunk_session_completes_immediately() {
        let (relays, peers) = manager();
        let receiver = peers.register("u2", None).await;
        let (handle, _rx) = ChannelHandle::new(8);
        peers.attach_channel(&receiver, handle).await.unwrap();
        let session_id = relays.open(PeerId::new(), receiver);

        relays
            .forward_chunk(&session_id, json!(null), 0, 1)
            .await
            .unwrap();
        assert_eq!(relays.get(&session_id).unwrap().status, RelayStatus::Completed);
    }

    #[tokio::test]
    async fn unreachable_receiver_reports_queued() {
        let (relays, peers) = manager();
        let receiver = peers.register("u2", None).await;
        let session_id = relays.open(PeerId::new(), receiver);

        let outcome = relays
            .forward_chunk(&session_id, json!("x"), 0, 1)
            .await
            .unwrap();
        assert_eq!(outcome, ForwardOutcome::Queued);
        assert_eq!(relays.get(&session_id).unwrap().status, RelayStatus::Initiated);
    }

    #[tokio::test]
    async fn unknown_session_fails_and_leaves_others_untouched() {
        let (relays, peers) = manager();
        let receiver = peers.register("u2", None).await;
        let (handle, _rx) = ChannelHandle::new(8);
        peers.attach_channel(&receiver, handle).await.unwrap();
        let session_id = relays.open(PeerId::new(), receiver);
        relays
            .forward_chunk(&session_id, json!("x"), 2, 3)
            .await
            .unwrap();

        let err = relays
            .forward_chunk(&SessionId::new(), json!("x"), 0, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));
        assert_eq!(relays.len(), 1);
        assert_eq!(relays.get(&session_id).unwrap().status, RelayStatus::Completed);
    }

    #[tokio::test]
    async fn out_of_range_index_is_rejected() {
        let (relays, _) = manager();
        let session_id = relays.open(PeerId::new(), PeerId::new());

        for (index, total) in [(0, 0), (3, 3), (7, 2)] {
            let err = relays
                .forward_chunk(&session_id, json!("x"), index, total)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn unknown_session_wins_over_bad_index() {
        let (relays, _) = manager();

        let err = relays
            .forward_chunk(&SessionId::new(), json!("x"), 5, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound { kind: "relay session", .. }));
    }

    #[tokio::test]
    async fn receiver_that_is_not_a_peer_id_is_queued() {
        let (relays, _) = manager();
        let session_id = relays.open(PeerId::new(), PeerRef::new("ghost"));

        let outcome = relays
            .forward_chunk(&session_id, json!("x"), 0, 1)
            .await
            .unwrap();
        assert_eq!(outcome, ForwardOutcome::Queued);
    }
}
