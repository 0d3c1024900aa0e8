//! End-to-end scenarios driven through the HTTP router.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use burrow_relay::config::Config;
use burrow_relay::http::build_router;
use burrow_relay::storage::FsPayloadStore;
use burrow_relay::BurrowRelay;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "burrow-test-boundary";

struct TestServer {
    app: Router,
    relay: Arc<BurrowRelay>,
    _tmp: tempfile::TempDir,
}

impl TestServer {
    async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.transfer_dir = tmp.path().to_path_buf();
        let store = FsPayloadStore::open(tmp.path()).await.unwrap();
        let relay = Arc::new(BurrowRelay::new(config, Arc::new(store)));
        Self {
            app: build_router(relay.clone()),
            relay,
            _tmp: tmp,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn upload(&self, transfer_id: &str, field: &str, filename: &str, data: &[u8]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/upload/{}", transfer_id))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn connect(&self, user_id: &str) -> String {
        let (status, body) = self.post("/connect", json!({ "user_id": user_id })).await;
        assert_eq!(status, StatusCode::OK);
        body["peer_id"].as_str().unwrap().to_string()
    }

    async fn approved_transfer(&self) -> String {
        let (_, requested) = self
            .post(
                "/request-transfer",
                json!({"sender_id": "u1", "receiver_id": "u2", "filename": "f.txt"}),
            )
            .await;
        let request_id = requested["request_id"].as_str().unwrap();
        let (_, approved) = self
            .post(&format!("/approve-transfer/{}", request_id), json!({}))
            .await;
        approved["transfer_id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn request_approve_complete_round_trip() {
    let server = TestServer::new().await;

    let p1 = server.connect("u1").await;
    let (_, peers) = server.get("/peers").await;
    assert_eq!(peers["peers"][&p1]["status"], "online");

    let (status, requested) = server
        .post(
            "/request-transfer",
            json!({"sender_id": "u1", "receiver_id": "u2", "filename": "f.txt"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(requested["status"], "pending");
    assert_eq!(requested["receiver_online"], false);
    let request_id = requested["request_id"].as_str().unwrap().to_string();

    // The receiver connects later; the peer list carries no request data.
    let p2 = server.connect("u2").await;
    let (_, peers) = server.get("/peers?user_id=u2").await;
    let listed = peers["peers"].as_object().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed.contains_key(&p2));
    assert!(!peers.to_string().contains(&request_id));

    let (status, approved) = server
        .post(&format!("/approve-transfer/{}", request_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["sender_online"], true);
    let transfer_id = approved["transfer_id"].as_str().unwrap().to_string();

    let (_, snapshot) = server
        .get(&format!("/transfer-status/{}", transfer_id))
        .await;
    assert_eq!(snapshot["status"], "ready");
    assert_eq!(snapshot["transfer_mode"], "p2p");
    assert!(snapshot["completed_at"].is_null());

    let (status, updated) = server
        .post(
            &format!("/update-transfer-status/{}", transfer_id),
            json!({"status": "completed", "progress": 100}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "updated");

    let (_, snapshot) = server
        .get(&format!("/transfer-status/{}", transfer_id))
        .await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["progress"], 100);
    assert!(snapshot["completed_at"].is_string());
}

#[tokio::test]
async fn approving_unknown_request_is_404_and_creates_nothing() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post(
            "/approve-transfer/00000000-0000-4000-8000-000000000000",
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let (status, _) = server.post("/approve-transfer/garbage", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(server.relay.transfers().is_empty());
}

#[tokio::test]
async fn missing_fields_are_rejected_without_side_effects() {
    let server = TestServer::new().await;

    let (status, body) = server.post("/connect", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("user_id"));
    assert_eq!(server.relay.peers().counts().await, (0, 0));

    let (status, _) = server
        .post(
            "/request-transfer",
            json!({"sender_id": "u1", "filename": "f.txt"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/connect")
        .body(Body::empty())
        .unwrap();
    let (status, _) = server.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn terminal_transfer_rejects_further_updates() {
    let server = TestServer::new().await;
    let transfer_id = server.approved_transfer().await;

    let (status, cancelled) = server
        .post(&format!("/cancel-transfer/{}", transfer_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, _) = server
        .post(
            &format!("/update-transfer-status/{}", transfer_id),
            json!({"status": "completed", "progress": 100}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post(&format!("/cancel-transfer/{}", transfer_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, snapshot) = server
        .get(&format!("/transfer-status/{}", transfer_id))
        .await;
    assert_eq!(snapshot["status"], "cancelled");
    assert!(snapshot["completed_at"].is_null());
}

#[tokio::test]
async fn bad_update_payloads_are_client_errors() {
    let server = TestServer::new().await;
    let transfer_id = server.approved_transfer().await;
    let uri = format!("/update-transfer-status/{}", transfer_id);

    let (status, _) = server.post(&uri, json!({"status": "exploded", "progress": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.post(&uri, json!({"status": "transferring", "progress": 101})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.post(&uri, json!({"progress": 10})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, snapshot) = server.get(&format!("/transfer-status/{}", transfer_id)).await;
    assert_eq!(snapshot["status"], "ready");
    assert_eq!(snapshot["progress"], 0);
}

#[tokio::test]
async fn relay_upload_then_download() {
    let server = TestServer::new().await;
    let transfer_id = server.approved_transfer().await;

    // Not staged yet.
    let request = Request::builder()
        .uri(format!("/download/{}", transfer_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = server.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, uploaded) = server
        .upload(&transfer_id, "file", "../../report final.txt", b"hello burrow")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["status"], "completed");
    let filename = uploaded["filename"].as_str().unwrap().to_string();
    assert!(!filename.contains('/'));

    let (_, snapshot) = server.get(&format!("/transfer-status/{}", transfer_id)).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["transfer_mode"], "server_relay");

    let request = Request::builder()
        .uri(format!("/download/{}", transfer_id))
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(&filename));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"hello burrow");

    // A completed relay transfer can no longer be cancelled.
    let (status, _) = server
        .post(&format!("/cancel-transfer/{}", transfer_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_errors() {
    let server = TestServer::new().await;

    let (status, _) = server
        .upload("00000000-0000-4000-8000-000000000000", "file", "a.txt", b"x")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let transfer_id = server.approved_transfer().await;
    let (status, body) = server.upload(&transfer_id, "other", "a.txt", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no file part"));

    let (status, _) = server.upload(&transfer_id, "file", "", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, snapshot) = server.get(&format!("/transfer-status/{}", transfer_id)).await;
    assert_eq!(snapshot["status"], "ready");
}

#[tokio::test]
async fn non_multipart_upload_checks_transfer_first() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post("/upload/00000000-0000-4000-8000-000000000000", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("transfer not found"));

    let transfer_id = server.approved_transfer().await;
    let (status, body) = server
        .post(&format!("/upload/{}", transfer_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn heartbeat_and_disconnect() {
    let server = TestServer::new().await;
    let peer_id = server.connect("u1").await;

    let (status, body) = server
        .post(&format!("/heartbeat/{}", peer_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = server
        .post(&format!("/disconnect/{}", peer_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "disconnected");

    let (_, peers) = server.get("/peers").await;
    assert!(peers["peers"].as_object().unwrap().is_empty());

    let (status, _) = server
        .post("/heartbeat/00000000-0000-4000-8000-000000000000", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reports_counts() {
    let server = TestServer::new().await;
    server.connect("u1").await;
    server.approved_transfer().await;

    let (status, body) = server.get("/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["connected_peers"], 1);
    assert_eq!(body["online_peers"], 1);
    assert_eq!(body["active_transfers"], 1);
    assert_eq!(body["server_id"], server.relay.server_id().to_string());
}
