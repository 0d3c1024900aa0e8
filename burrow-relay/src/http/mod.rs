//! HTTP endpoints for burrow-relay.
//!
//! Request/response operations for peers and transfers, the fallback
//! upload/download path, the WebSocket channel upgrade, status and metrics.

mod channel;
pub mod status;
mod metrics;
mod peers;
mod transfers;

use crate::error::RelayError;
use crate::server::BurrowRelay;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

pub use status::ServerStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<BurrowRelay>) -> Router {
    let upload_limit = relay.config().storage.max_upload_bytes;

    Router::new()
        .route("/status", get(status::status_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/connect", post(peers::connect_handler))
        .route("/heartbeat/:peer_id", post(peers::heartbeat_handler))
        .route("/peers", get(peers::list_peers_handler))
        .route("/disconnect/:peer_id", post(peers::disconnect_handler))
        .route("/request-transfer", post(transfers::request_handler))
        .route(
            "/approve-transfer/:request_id",
            post(transfers::approve_handler),
        )
        .route(
            "/upload/:transfer_id",
            post(transfers::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/download/:transfer_id", get(transfers::download_handler))
        .route(
            "/transfer-status/:transfer_id",
            get(transfers::transfer_status_handler),
        )
        .route(
            "/update-transfer-status/:transfer_id",
            post(transfers::update_status_handler),
        )
        .route(
            "/cancel-transfer/:transfer_id",
            post(transfers::cancel_handler),
        )
        .route("/ws", get(channel::ws_handler))
        .layer(Extension(relay))
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::InvalidInput(_) | RelayError::InvalidTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            RelayError::Storage(_) | RelayError::Config(_) | RelayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if !self.is_client_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Decode a JSON body whose fields are all optional.
///
/// An empty or malformed body is a missing-parameters error.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    serde_json::from_slice(body)
        .map_err(|_| RelayError::InvalidInput("Missing required parameters".to_string()))
}

/// Unwrap a required body field.
fn required<T>(value: Option<T>, field: &str) -> Result<T, RelayError> {
    value.ok_or_else(|| RelayError::InvalidInput(format!("Missing required parameter: {}", field)))
}

/// Parse a path identifier. Anything unparseable cannot be registered.
fn parse_id<T: FromStr>(raw: &str, kind: &'static str) -> Result<T, RelayError> {
    raw.parse().map_err(|_| RelayError::not_found(kind, raw))
}
