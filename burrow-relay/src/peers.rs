//! Peer registry.
//!
//! Tracks every peer's identity, liveness and the channel currently attached
//! to it. All state sits behind one lock so the peer table, the `user_id`
//! index and the channel map always change together. Each method holds the
//! lock for a single lookup-mutate step and returns owned snapshots or
//! channel handles; delivery happens after the lock is released.
//!
//! Peers are never deleted by disconnects or timeouts, only marked offline.
//! [`PeerRegistry::sweep`] can prune long-offline peers when a retention
//! window is configured.

use burrow_types::{ChannelId, PeerId, PeerRef, PeerStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{RelayError, Result};
use crate::notify::ChannelHandle;

/// One registered peer.
#[derive(Debug, Clone, Serialize)]
pub struct Peer {
    /// Server-issued identifier.
    pub peer_id: PeerId,
    /// Caller-supplied logical identity. Shared across a user's devices.
    pub user_id: String,
    /// Remote address seen on `connect`, if known.
    #[serde(rename = "ip")]
    pub addr: Option<String>,
    /// Current liveness.
    pub status: PeerStatus,
    /// When the peer registered.
    pub connected_at: DateTime<Utc>,
    /// Last heartbeat or channel attach.
    pub last_seen: DateTime<Utc>,
    /// When the peer was last explicitly disconnected or lost its channel.
    pub disconnected_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a peer.
#[derive(Debug, Clone, Serialize)]
pub struct PeerSnapshot {
    /// The peer record.
    #[serde(flatten)]
    pub peer: Peer,
    /// Whether a channel is currently attached.
    pub channel_attached: bool,
}

/// Result of a channel closing.
#[derive(Debug, Default)]
pub struct ChannelLoss {
    /// Peers that were bound to the closed channel and are now offline.
    pub peers: Vec<PeerId>,
    /// Every other attached channel, for `peer_disconnected` fan-out.
    pub audience: Vec<ChannelHandle>,
}

/// Result of one liveness sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Peers demoted to offline.
    pub demoted: usize,
    /// Offline peers forgotten.
    pub pruned: usize,
}

/// Reachable channels of one user's online peers.
#[derive(Debug, Default)]
pub struct UserPresence {
    /// At least one of the user's peers is online.
    pub online: bool,
    /// Channels attached to those online peers.
    pub channels: Vec<ChannelHandle>,
}

#[derive(Debug, Default)]
struct PeerTable {
    peers: HashMap<PeerId, Peer>,
    by_user: HashMap<String, HashSet<PeerId>>,
    channels: HashMap<PeerId, ChannelHandle>,
}

impl PeerTable {
    fn peer_mut(&mut self, peer_id: &PeerId) -> Result<&mut Peer> {
        self.peers
            .get_mut(peer_id)
            .ok_or_else(|| RelayError::not_found("peer", peer_id))
    }

    fn snapshot(&self, peer: &Peer) -> PeerSnapshot {
        PeerSnapshot {
            peer: peer.clone(),
            channel_attached: self.channels.contains_key(&peer.peer_id),
        }
    }

    fn remove(&mut self, peer_id: &PeerId) {
        if let Some(peer) = self.peers.remove(peer_id) {
            if let Some(ids) = self.by_user.get_mut(&peer.user_id) {
                ids.remove(peer_id);
                if ids.is_empty() {
                    self.by_user.remove(&peer.user_id);
                }
            }
        }
        self.channels.remove(peer_id);
    }
}

/// Registry of all peers.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    inner: RwLock<PeerTable>,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new peer for `user_id`.
    ///
    /// Always creates a fresh peer; the same user may register many times.
    pub async fn register(&self, user_id: &str, addr: Option<String>) -> PeerId {
        let peer_id = PeerId::new();
        let now = Utc::now();
        let peer = Peer {
            peer_id,
            user_id: user_id.to_string(),
            addr,
            status: PeerStatus::Online,
            connected_at: now,
            last_seen: now,
            disconnected_at: None,
        };

        let mut table = self.inner.write().await;
        table.peers.insert(peer_id, peer);
        table
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(peer_id);

        tracing::info!("Registered peer {} for user {}", peer_id, user_id);
        peer_id
    }

    /// Attach a channel to a peer, superseding any previous one.
    ///
    /// Returns the superseded handle, if there was one.
    pub async fn attach_channel(
        &self,
        peer_id: &PeerId,
        channel: ChannelHandle,
    ) -> Result<Option<ChannelHandle>> {
        let mut table = self.inner.write().await;
        table.peer_mut(peer_id)?.last_seen = Utc::now();
        let previous = table.channels.insert(*peer_id, channel);

        if let Some(previous) = &previous {
            tracing::debug!(
                "Channel {:?} superseded for peer {}",
                previous.id(),
                peer_id
            );
        }
        Ok(previous)
    }

    /// Refresh liveness and mark the peer online.
    pub async fn heartbeat(&self, peer_id: &PeerId) -> Result<()> {
        let mut table = self.inner.write().await;
        let peer = table.peer_mut(peer_id)?;
        peer.last_seen = Utc::now();
        peer.status = PeerStatus::Online;
        Ok(())
    }

    /// Explicitly disconnect a peer. Clears its channel.
    pub async fn disconnect(&self, peer_id: &PeerId) -> Result<()> {
        let mut table = self.inner.write().await;
        let peer = table.peer_mut(peer_id)?;
        peer.status = PeerStatus::Offline;
        peer.disconnected_at = Some(Utc::now());
        table.channels.remove(peer_id);

        tracing::info!("Peer disconnected: {}", peer_id);
        Ok(())
    }

    /// Handle a closed channel.
    ///
    /// Only peers whose *current* channel is `channel_id` are affected; a
    /// channel that was already superseded closes silently.
    pub async fn channel_lost(&self, channel_id: ChannelId) -> ChannelLoss {
        let mut table = self.inner.write().await;

        let bound: Vec<PeerId> = table
            .channels
            .iter()
            .filter(|(_, handle)| handle.id() == channel_id)
            .map(|(peer_id, _)| *peer_id)
            .collect();

        if bound.is_empty() {
            return ChannelLoss::default();
        }

        let now = Utc::now();
        for peer_id in &bound {
            table.channels.remove(peer_id);
            if let Some(peer) = table.peers.get_mut(peer_id) {
                peer.status = PeerStatus::Offline;
                peer.disconnected_at = Some(now);
            }
            tracing::info!("Peer marked offline after channel loss: {}", peer_id);
        }

        ChannelLoss {
            peers: bound,
            audience: table.channels.values().cloned().collect(),
        }
    }

    /// Online peers, optionally restricted to one user.
    pub async fn list_online(&self, user_id: Option<&str>) -> Vec<PeerSnapshot> {
        let table = self.inner.read().await;
        let online = |peer: &&Peer| peer.status == PeerStatus::Online;

        match user_id {
            Some(user_id) => table
                .by_user
                .get(user_id)
                .into_iter()
                .flatten()
                .filter_map(|peer_id| table.peers.get(peer_id))
                .filter(online)
                .map(|peer| table.snapshot(peer))
                .collect(),
            None => table
                .peers
                .values()
                .filter(online)
                .map(|peer| table.snapshot(peer))
                .collect(),
        }
    }

    /// Snapshot of a single peer, online or not.
    pub async fn get(&self, peer_id: &PeerId) -> Option<PeerSnapshot> {
        let table = self.inner.read().await;
        table.peers.get(peer_id).map(|peer| table.snapshot(peer))
    }

    /// Channel of a peer that is online and has one attached.
    pub async fn reachable(&self, peer_id: &PeerId) -> Option<ChannelHandle> {
        let table = self.inner.read().await;
        match table.peers.get(peer_id) {
            Some(peer) if peer.status == PeerStatus::Online => table.channels.get(peer_id).cloned(),
            _ => None,
        }
    }

    /// [`reachable`](Self::reachable) for a peer named in a channel frame.
    /// A reference that is not a peer id reaches nobody.
    pub async fn reachable_ref(&self, peer: &PeerRef) -> Option<ChannelHandle> {
        match peer.peer_id() {
            Some(peer_id) => self.reachable(&peer_id).await,
            None => None,
        }
    }

    /// Channels of every online peer belonging to `user_id`.
    pub async fn presence(&self, user_id: &str) -> UserPresence {
        let table = self.inner.read().await;
        let mut presence = UserPresence::default();

        for peer_id in table.by_user.get(user_id).into_iter().flatten() {
            let online = table
                .peers
                .get(peer_id)
                .is_some_and(|peer| peer.status == PeerStatus::Online);
            if !online {
                continue;
            }
            presence.online = true;
            if let Some(channel) = table.channels.get(peer_id) {
                presence.channels.push(channel.clone());
            }
        }
        presence
    }

    /// Demote peers silent for longer than `timeout`, as of `now`.
    ///
    /// Demotion keeps the attached channel: a silent peer is not the same as
    /// a disconnected one. With `retention` set, offline peers whose last
    /// activity is older than `retention` are removed entirely.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
        retention: Option<Duration>,
    ) -> SweepReport {
        let mut table = self.inner.write().await;
        let mut report = SweepReport::default();

        for peer in table.peers.values_mut() {
            if peer.status == PeerStatus::Online && elapsed_exceeds(now, peer.last_seen, timeout) {
                peer.status = PeerStatus::Offline;
                report.demoted += 1;
                tracing::info!("Peer marked inactive: {}", peer.peer_id);
            }
        }

        if let Some(retention) = retention {
            let expired: Vec<PeerId> = table
                .peers
                .values()
                .filter(|peer| peer.status == PeerStatus::Offline)
                .filter(|peer| {
                    let last_activity = peer
                        .disconnected_at
                        .map_or(peer.last_seen, |at| at.max(peer.last_seen));
                    elapsed_exceeds(now, last_activity, retention)
                })
                .map(|peer| peer.peer_id)
                .collect();

            for peer_id in &expired {
                table.remove(peer_id);
            }
            report.pruned = expired.len();
        }

        report
    }

    /// Total peer records and how many are online.
    pub async fn counts(&self) -> (usize, usize) {
        let table = self.inner.read().await;
        let online = table
            .peers
            .values()
            .filter(|peer| peer.status == PeerStatus::Online)
            .count();
        (table.peers.len(), online)
    }
}

/// `now - since > limit`. A timestamp in the future never exceeds.
fn elapsed_exceeds(now: DateTime<Utc>, since: DateTime<Utc>, limit: Duration) -> bool {
    (now - since)
        .to_std()
        .map(|elapsed| elapsed > limit)
        .unwrap_or(false)
}
