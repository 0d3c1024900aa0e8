//! Main BurrowRelay server coordination.
//!
//! BurrowRelay owns the registries, wires them to a shared [`Notifier`] and
//! translates persistent-channel events into registry operations.

use crate::config::Config;
use crate::error::Result;
use crate::notify::{ChannelHandle, ChannelNotifier, Notifier};
use crate::peers::PeerRegistry;
use crate::relay::{ForwardOutcome, RelaySessionManager};
use crate::signal::{RouteOutcome, SignalRouter};
use crate::storage::{FsPayloadStore, PayloadStore};
use crate::transfers::TransferWorkflow;
use burrow_types::{Ack, AckStatus, ChannelId, ClientEvent, PeerId, ServerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total peers registered via `connect`.
    pub peers_registered: AtomicU64,
    /// Total persistent channels opened.
    pub channels_opened: AtomicU64,
    /// Total negotiation signals delivered directly.
    pub signals_delivered: AtomicU64,
    /// Total relay sessions opened.
    pub relay_sessions_opened: AtomicU64,
    /// Total relay chunks delivered.
    pub chunks_forwarded: AtomicU64,
    /// Total relay chunks reported `queued` (not delivered).
    pub chunks_queued: AtomicU64,
    /// Total transfers completed, direct or relayed.
    pub transfers_completed: AtomicU64,
    /// Total transfers cancelled.
    pub transfers_cancelled: AtomicU64,
    /// Total fallback payload bytes staged.
    pub bytes_uploaded: AtomicU64,
    /// Total outbound events dropped (full or closed channel).
    pub notifications_dropped: AtomicU64,
}

/// Main relay server.
pub struct BurrowRelay {
    config: Config,
    server_id: uuid::Uuid,
    started_at: Instant,
    metrics: Arc<RelayMetrics>,
    notifier: Arc<dyn Notifier>,
    peers: Arc<PeerRegistry>,
    relays: Arc<RelaySessionManager>,
    router: SignalRouter,
    transfers: TransferWorkflow,
}

impl std::fmt::Debug for BurrowRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BurrowRelay")
            .field("server_id", &self.server_id)
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("relay_sessions", &self.relays.len())
            .field("transfers", &self.transfers.len())
            .finish_non_exhaustive()
    }
}

impl BurrowRelay {
    /// Create a relay with the given config and payload store.
    pub fn new(config: Config, store: Arc<dyn PayloadStore>) -> Self {
        let metrics = Arc::new(RelayMetrics::default());
        let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(metrics.clone()));
        let peers = Arc::new(PeerRegistry::new());
        let relays = Arc::new(RelaySessionManager::new(
            peers.clone(),
            notifier.clone(),
            metrics.clone(),
        ));
        let router = SignalRouter::new(
            peers.clone(),
            relays.clone(),
            notifier.clone(),
            metrics.clone(),
        );
        let transfers =
            TransferWorkflow::new(peers.clone(), notifier.clone(), store, metrics.clone());

        Self {
            config,
            server_id: uuid::Uuid::new_v4(),
            started_at: Instant::now(),
            metrics,
            notifier,
            peers,
            relays,
            router,
            transfers,
        }
    }

    /// Create a relay staging payloads under `storage.transfer_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer directory cannot be created.
    pub async fn open(config: Config) -> Result<Self> {
        let store = FsPayloadStore::open(&config.storage.transfer_dir).await?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identity of this server process.
    pub fn server_id(&self) -> uuid::Uuid {
        self.server_id
    }

    /// Seconds since the relay was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Get access to the peer registry.
    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Get a clone of the peer registry Arc for background tasks.
    pub fn peers_arc(&self) -> Arc<PeerRegistry> {
        self.peers.clone()
    }

    /// Get access to the relay sessions.
    pub fn relays(&self) -> &RelaySessionManager {
        &self.relays
    }

    /// Get access to the signal router.
    pub fn router(&self) -> &SignalRouter {
        &self.router
    }

    /// Get access to the transfer workflow.
    pub fn transfers(&self) -> &TransferWorkflow {
        &self.transfers
    }

    /// Register a peer for `user_id`.
    pub async fn connect_peer(&self, user_id: &str, addr: Option<String>) -> PeerId {
        self.metrics.peers_registered.fetch_add(1, Ordering::Relaxed);
        self.peers.register(user_id, addr).await
    }

    /// Allocate the outbound queue for a new persistent channel.
    pub fn open_channel(&self) -> (ChannelHandle, mpsc::Receiver<ServerEvent>) {
        self.metrics.channels_opened.fetch_add(1, Ordering::Relaxed);
        ChannelHandle::new(self.config.signaling.channel_buffer)
    }

    /// Handle one inbound channel event and produce its acknowledgement.
    pub async fn handle_event(&self, channel: &ChannelHandle, event: ClientEvent) -> Ack {
        let name = event.name();
        match event {
            ClientEvent::RegisterSocket { peer_id } => {
                match self.peers.attach_channel(&peer_id, channel.clone()).await {
                    Ok(_) => {
                        tracing::info!("Socket registered for peer: {}", peer_id);
                        Ack::success(name)
                    }
                    Err(e) => {
                        tracing::warn!("Socket registration rejected: {}", e);
                        Ack::error(name, "Invalid peer ID")
                    }
                }
            }
            ClientEvent::PeerSignal {
                sender_peer_id,
                target_peer_id,
                signal,
            } => match self
                .router
                .route_signal(sender_peer_id, target_peer_id, signal)
                .await
            {
                RouteOutcome::Delivered => Ack::success(name),
                RouteOutcome::RelayInitiated(session_id) => Ack {
                    event: name.to_string(),
                    status: AckStatus::Relay,
                    message: Some("Target peer unavailable, using relay".to_string()),
                    session_id: Some(session_id),
                },
            },
            ClientEvent::RelayChunk {
                session_id,
                chunk,
                index,
                total,
            } => match self
                .relays
                .forward_chunk(&session_id, chunk, index, total)
                .await
            {
                Ok(ForwardOutcome::Delivered) => Ack::success(name),
                Ok(ForwardOutcome::Queued) => Ack {
                    event: name.to_string(),
                    status: AckStatus::Queued,
                    message: Some("Receiver offline, chunk not delivered".to_string()),
                    session_id: Some(session_id),
                },
                Err(e) => Ack::error(name, e.to_string()),
            },
        }
    }

    /// Queue an acknowledgement on the channel that sent the event.
    pub fn reply(&self, channel: &ChannelHandle, ack: Ack) -> bool {
        self.notifier.deliver(channel, ServerEvent::Ack(ack))
    }

    /// Handle a closed channel: mark its peers offline and tell everyone else.
    pub async fn channel_closed(&self, channel_id: ChannelId) {
        let loss = self.peers.channel_lost(channel_id).await;
        for peer_id in loss.peers {
            let reached = self
                .notifier
                .broadcast(&loss.audience, &ServerEvent::PeerDisconnected { peer_id });
            tracing::debug!(
                "Sent peer_disconnected for {} to {}/{} channels",
                peer_id,
                reached,
                loss.audience.len()
            );
        }
    }
}
