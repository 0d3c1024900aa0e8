//! Peer registration, heartbeat, listing and disconnect endpoints.

use super::{parse_body, parse_id, required};
use crate::error::RelayError;
use crate::peers::PeerSnapshot;
use crate::server::BurrowRelay;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query};
use axum::{Extension, Json};
use burrow_types::PeerId;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ConnectBody {
    user_id: Option<String>,
}

/// Query for `GET /peers`.
#[derive(Debug, Deserialize)]
pub struct PeersQuery {
    user_id: Option<String>,
}

/// `POST /connect`: register a new device for a user.
pub async fn connect_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let body: ConnectBody = parse_body(&body)?;
    let user_id = required(body.user_id, "user_id")?;
    let addr = remote.map(|ConnectInfo(addr)| addr.ip().to_string());

    let peer_id = relay.connect_peer(&user_id, addr).await;
    let config = relay.config();

    Ok(Json(json!({
        "status": "connected",
        "peer_id": peer_id,
        "server_id": relay.server_id(),
        "stun_servers": config.signaling.stun_servers,
        "public_url": config.server.public_url,
    })))
}

/// `POST /heartbeat/:peer_id`
pub async fn heartbeat_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(peer_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let peer_id: PeerId = parse_id(&peer_id, "peer")?;
    relay.peers().heartbeat(&peer_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// `GET /peers?user_id=`: online peers, optionally for one user.
pub async fn list_peers_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Query(query): Query<PeersQuery>,
) -> Json<Value> {
    let peers: BTreeMap<String, PeerSnapshot> = relay
        .peers()
        .list_online(query.user_id.as_deref())
        .await
        .into_iter()
        .map(|snapshot| (snapshot.peer.peer_id.to_string(), snapshot))
        .collect();

    Json(json!({ "peers": peers }))
}

/// `POST /disconnect/:peer_id`
pub async fn disconnect_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(peer_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let peer_id: PeerId = parse_id(&peer_id, "peer")?;
    relay.peers().disconnect(&peer_id).await?;
    Ok(Json(json!({ "status": "disconnected", "peer_id": peer_id })))
}
