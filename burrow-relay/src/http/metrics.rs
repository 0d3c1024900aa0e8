//! Prometheus metrics endpoint.

use crate::server::BurrowRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<BurrowRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges
    let (peers, online) = relay.peers().counts().await;
    let transfers = relay.transfers().len();
    let sessions = relay.relays().len();

    // Counters
    let registered = m.peers_registered.load(Ordering::Relaxed);
    let channels = m.channels_opened.load(Ordering::Relaxed);
    let signals = m.signals_delivered.load(Ordering::Relaxed);
    let sessions_total = m.relay_sessions_opened.load(Ordering::Relaxed);
    let forwarded = m.chunks_forwarded.load(Ordering::Relaxed);
    let queued = m.chunks_queued.load(Ordering::Relaxed);
    let completed = m.transfers_completed.load(Ordering::Relaxed);
    let cancelled = m.transfers_cancelled.load(Ordering::Relaxed);
    let uploaded = m.bytes_uploaded.load(Ordering::Relaxed);
    let dropped = m.notifications_dropped.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP burrow_relay_peers Peer records held
# TYPE burrow_relay_peers gauge
burrow_relay_peers {peers}

# HELP burrow_relay_peers_online Peers currently online
# TYPE burrow_relay_peers_online gauge
burrow_relay_peers_online {online}

# HELP burrow_relay_transfers Transfers tracked
# TYPE burrow_relay_transfers gauge
burrow_relay_transfers {transfers}

# HELP burrow_relay_relay_sessions Relay sessions tracked
# TYPE burrow_relay_relay_sessions gauge
burrow_relay_relay_sessions {sessions}

# HELP burrow_relay_info Server information
# TYPE burrow_relay_info gauge
burrow_relay_info{{version="{version}"}} 1

# HELP burrow_relay_peers_registered_total Total peers registered
# TYPE burrow_relay_peers_registered_total counter
burrow_relay_peers_registered_total {registered}

# HELP burrow_relay_channels_opened_total Total persistent channels opened
# TYPE burrow_relay_channels_opened_total counter
burrow_relay_channels_opened_total {channels}

# HELP burrow_relay_signals_delivered_total Total signals delivered directly
# TYPE burrow_relay_signals_delivered_total counter
burrow_relay_signals_delivered_total {signals}

# HELP burrow_relay_relay_sessions_opened_total Total relay sessions opened
# TYPE burrow_relay_relay_sessions_opened_total counter
burrow_relay_relay_sessions_opened_total {sessions_total}

# HELP burrow_relay_chunks_forwarded_total Total relay chunks delivered
# TYPE burrow_relay_chunks_forwarded_total counter
burrow_relay_chunks_forwarded_total {forwarded}

# HELP burrow_relay_chunks_queued_total Total relay chunks not delivered
# TYPE burrow_relay_chunks_queued_total counter
burrow_relay_chunks_queued_total {queued}

# HELP burrow_relay_transfers_completed_total Total transfers completed
# TYPE burrow_relay_transfers_completed_total counter
burrow_relay_transfers_completed_total {completed}

# HELP burrow_relay_transfers_cancelled_total Total transfers cancelled
# TYPE burrow_relay_transfers_cancelled_total counter
burrow_relay_transfers_cancelled_total {cancelled}

# HELP burrow_relay_bytes_uploaded_total Total fallback payload bytes staged
# TYPE burrow_relay_bytes_uploaded_total counter
burrow_relay_bytes_uploaded_total {uploaded}

# HELP burrow_relay_notifications_dropped_total Total outbound events dropped
# TYPE burrow_relay_notifications_dropped_total counter
burrow_relay_notifications_dropped_total {dropped}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::FsPayloadStore;

    #[tokio::test]
    async fn metrics_reflect_registry_state() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsPayloadStore::open(tmp.path()).await.unwrap();
        let relay = Arc::new(BurrowRelay::new(Config::default(), Arc::new(store)));
        relay.connect_peer("u1", None).await;
        relay.connect_peer("u2", None).await;

        let response = metrics_handler(Extension(relay)).await.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains("burrow_relay_peers 2\n"));
        assert!(text.contains("burrow_relay_peers_online 2\n"));
        assert!(text.contains("burrow_relay_peers_registered_total 2\n"));
        assert!(text.contains("# TYPE burrow_relay_transfers gauge"));
    }
}
