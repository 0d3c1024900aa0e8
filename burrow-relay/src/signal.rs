//! Direct-connection signal routing.
//!
//! Forwards opaque negotiation payloads between peers' channels. When the
//! target cannot be reached, routing falls back to a relay session instead
//! of failing.

use burrow_types::{PeerRef, ServerEvent, SessionId};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::notify::Notifier;
use crate::peers::PeerRegistry;
use crate::relay::RelaySessionManager;
use crate::server::RelayMetrics;

/// Result of routing one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The payload was handed to the target's channel.
    Delivered,
    /// The target was unreachable; a relay session was opened instead.
    RelayInitiated(SessionId),
}

/// Routes negotiation payloads between peers.
#[derive(Debug)]
pub struct SignalRouter {
    peers: Arc<PeerRegistry>,
    relays: Arc<RelaySessionManager>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<RelayMetrics>,
}

impl SignalRouter {
    /// Create a router over the given registries.
    pub fn new(
        peers: Arc<PeerRegistry>,
        relays: Arc<RelaySessionManager>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            peers,
            relays,
            notifier,
            metrics,
        }
    }

    /// Forward `signal` from `sender` to `target`.
    ///
    /// Never fails. An unknown, offline or channel-less target (or one whose
    /// queue rejects the payload) opens a relay session and tells the sender
    /// about it with `relay_initiated`. A target that is not a peer id at all
    /// counts as unknown.
    pub async fn route_signal(
        &self,
        sender: PeerRef,
        target: PeerRef,
        signal: serde_json::Value,
    ) -> RouteOutcome {
        if let Some(channel) = self.peers.reachable_ref(&target).await {
            let event = ServerEvent::PeerSignal {
                sender_peer_id: sender.clone(),
                signal,
            };
            if self.notifier.deliver(&channel, event) {
                self.metrics
                    .signals_delivered
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Signal {} -> {} delivered", sender, target);
                return RouteOutcome::Delivered;
            }
        }

        let session_id = self.relays.open(sender.clone(), target.clone());
        tracing::info!(
            "Target {} unreachable for {}, relay session {} initiated",
            target,
            sender,
            session_id
        );
        if let Some(channel) = self.peers.reachable_ref(&sender).await {
            self.notifier.deliver(
                &channel,
                ServerEvent::RelayInitiated {
                    session_id,
                    target_peer_id: target,
                },
            );
        }

        RouteOutcome::RelayInitiated(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelHandle, ChannelNotifier};
    use burrow_types::PeerId;
    use serde_json::json;

    struct Fixture {
        router: SignalRouter,
        peers: Arc<PeerRegistry>,
        relays: Arc<RelaySessionManager>,
    }

    fn fixture() -> Fixture {
        let peers = Arc::new(PeerRegistry::new());
        let metrics = Arc::new(RelayMetrics::default());
        let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(metrics.clone()));
        let relays = Arc::new(RelaySessionManager::new(
            peers.clone(),
            notifier.clone(),
            metrics.clone(),
        ));
        Fixture {
            router: SignalRouter::new(peers.clone(), relays.clone(), notifier, metrics),
            peers,
            relays,
        }
    }

    #[tokio::test]
    async fn signal_reaches_online_target_verbatim() {
        let f = fixture();
        let sender = f.peers.register("u1", None).await;
        let target = f.peers.register("u2", None).await;
        let (handle, mut rx) = ChannelHandle::new(4);
        f.peers.attach_channel(&target, handle).await.unwrap();

        let payload = json!({"type": "offer", "sdp": "v=0\r\no=- 0 0 IN IP4 0.0.0.0"});
        let outcome = f.router.route_signal(sender.into(), target.into(), payload.clone()).await;

        assert_eq!(outcome, RouteOutcome::Delivered);
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::PeerSignal {
                sender_peer_id: sender.into(),
                signal: payload
            })
        );
        assert!(f.relays.is_empty());
    }

    #[tokio::test]
    async fn unknown_target_opens_relay_and_tells_sender() {
        let f = fixture();
        let sender = f.peers.register("u1", None).await;
        let (handle, mut rx) = ChannelHandle::new(4);
        f.peers.attach_channel(&sender, handle).await.unwrap();
        let ghost = PeerId::new();

        let outcome = f.router.route_signal(sender.into(), ghost.into(), json!({})).await;

        let RouteOutcome::RelayInitiated(session_id) = outcome else {
            panic!("expected relay fallback, got {:?}", outcome);
        };
        let session = f.relays.get(&session_id).unwrap();
        assert_eq!(session.sender_peer_id, sender);
        assert_eq!(session.receiver_peer_id, ghost);
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::RelayInitiated {
                session_id,
                target_peer_id: ghost.into()
            })
        );
    }

    #[tokio::test]
    async fn offline_target_with_channel_falls_back() {
        let f = fixture();
        let sender = f.peers.register("u1", None).await;
        let target = f.peers.register("u2", None).await;
        let (handle, _rx) = ChannelHandle::new(4);
        f.peers.attach_channel(&target, handle).await.unwrap();
        f.peers
            .sweep(
                chrono::Utc::now() + chrono::TimeDelta::seconds(120),
                std::time::Duration::from_secs(60),
                None,
            )
            .await;

        let outcome = f.router.route_signal(sender.into(), target.into(), json!("x")).await;
        assert!(matches!(outcome, RouteOutcome::RelayInitiated(_)));
    }

    #[tokio::test]
    async fn every_fallback_gets_a_fresh_session() {
        let f = fixture();
        let sender = PeerRef::from(PeerId::new());
        let target = PeerRef::from(PeerId::new());

        let a = f.router.route_signal(sender.clone(), target.clone(), json!(1)).await;
        let b = f.router.route_signal(sender, target, json!(2)).await;

        assert_ne!(a, b);
        assert_eq!(f.relays.len(), 2);
    }

    #[tokio::test]
    async fn target_that_is_not_a_peer_id_falls_back_to_relay() {
        let f = fixture();
        let sender = f.peers.register("u1", None).await;
        let (handle, mut rx) = ChannelHandle::new(4);
        f.peers.attach_channel(&sender, handle).await.unwrap();

        let outcome = f
            .router
            .route_signal(sender.into(), PeerRef::new("ghost"), json!({"type": "offer"}))
            .await;

        let RouteOutcome::RelayInitiated(session_id) = outcome else {
            panic!("expected relay fallback, got {:?}", outcome);
        };
        assert_eq!(f.relays.get(&session_id).unwrap().receiver_peer_id.as_str(), "ghost");
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::RelayInitiated {
                session_id,
                target_peer_id: PeerRef::new("ghost")
            })
        );
    }
}
