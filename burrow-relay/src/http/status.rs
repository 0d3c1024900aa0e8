//! Server status endpoint.

use crate::server::BurrowRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Server status response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    /// Overall status.
    pub status: String,
    /// Identity of this server process.
    pub server_id: String,
    /// Server version.
    pub version: String,
    /// Listener address.
    pub bind_address: String,
    /// Public URL when exposed through a tunnel.
    pub public_url: Option<String>,
    /// Peer records held, online or not.
    pub connected_peers: usize,
    /// Peers currently online.
    pub online_peers: usize,
    /// Transfers tracked.
    pub active_transfers: usize,
    /// Relay sessions tracked.
    pub relay_sessions: usize,
    /// STUN servers handed to peers.
    pub stun_servers: Vec<String>,
    /// Liveness sweep interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Liveness timeout in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Status handler.
pub async fn status_handler(Extension(relay): Extension<Arc<BurrowRelay>>) -> Json<ServerStatus> {
    let config = relay.config();
    let (connected_peers, online_peers) = relay.peers().counts().await;

    Json(ServerStatus {
        status: "online".to_string(),
        server_id: relay.server_id().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bind_address: config.server.bind_address.clone(),
        public_url: config.server.public_url.clone(),
        connected_peers,
        online_peers,
        active_transfers: relay.transfers().len(),
        relay_sessions: relay.relays().len(),
        stun_servers: config.signaling.stun_servers.clone(),
        heartbeat_interval_secs: config.liveness.interval_secs,
        heartbeat_timeout_secs: config.liveness.timeout_secs,
        uptime_seconds: relay.uptime_secs(),
    })
}
