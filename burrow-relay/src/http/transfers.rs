//! Transfer request, approval, status and fallback payload endpoints.

use super::{parse_body, parse_id, required};
use crate::error::RelayError;
use crate::server::BurrowRelay;
use crate::transfers::ActiveTransfer;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use burrow_types::{RequestId, TransferId, TransferStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RequestBody {
    sender_id: Option<String>,
    receiver_id: Option<String>,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    status: Option<String>,
    progress: Option<u64>,
}

/// `POST /request-transfer`
pub async fn request_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let body: RequestBody = parse_body(&body)?;
    let sender_id = required(body.sender_id, "sender_id")?;
    let receiver_id = required(body.receiver_id, "receiver_id")?;
    let filename = required(body.filename, "filename")?;

    let outcome = relay
        .transfers()
        .request(&sender_id, &receiver_id, &filename)
        .await;

    Ok(Json(json!({
        "status": "pending",
        "request_id": outcome.request_id,
        "receiver_online": outcome.receiver_online,
    })))
}

/// `POST /approve-transfer/:request_id`
pub async fn approve_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let request_id: RequestId = parse_id(&request_id, "transfer request")?;
    let outcome = relay.transfers().approve(&request_id).await?;

    Ok(Json(json!({
        "status": "approved",
        "transfer_id": outcome.transfer_id,
        "sender_online": outcome.sender_online,
    })))
}

/// `GET /transfer-status/:transfer_id`
pub async fn transfer_status_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(transfer_id): Path<String>,
) -> Result<Json<ActiveTransfer>, RelayError> {
    let transfer_id: TransferId = parse_id(&transfer_id, "transfer")?;
    Ok(Json(relay.transfers().get(&transfer_id)?))
}

/// `POST /update-transfer-status/:transfer_id`
pub async fn update_status_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(transfer_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let transfer_id: TransferId = parse_id(&transfer_id, "transfer")?;
    let body: UpdateBody = parse_body(&body)?;
    let status: TransferStatus = required(body.status, "status")?
        .parse()
        .map_err(|e: burrow_types::TypesError| RelayError::InvalidInput(e.to_string()))?;
    let progress = required(body.progress, "progress")?;
    let progress = u8::try_from(progress).map_err(|_| {
        RelayError::InvalidInput(format!(
            "progress must be between 0 and 100, got {}",
            progress
        ))
    })?;

    relay
        .transfers()
        .update_status(&transfer_id, status, progress)
        .await?;
    Ok(Json(json!({ "status": "updated" })))
}

/// `POST /cancel-transfer/:transfer_id`
pub async fn cancel_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(transfer_id): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let transfer_id: TransferId = parse_id(&transfer_id, "transfer")?;
    relay.transfers().cancel(&transfer_id).await?;
    Ok(Json(json!({ "status": "cancelled", "transfer_id": transfer_id })))
}

/// `POST /upload/:transfer_id`: stage a fallback payload from the `file` field.
///
/// An unknown transfer is reported before the body is looked at.
pub async fn upload_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(transfer_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, RelayError> {
    let transfer_id: TransferId = parse_id(&transfer_id, "transfer")?;
    relay.transfers().get(&transfer_id)?;
    let mut multipart = multipart.map_err(|e| RelayError::InvalidInput(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::InvalidInput(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let client_filename = field.file_name().unwrap_or_default().to_string();
        let payload = field
            .bytes()
            .await
            .map_err(|e| RelayError::InvalidInput(e.body_text()))?;

        let filename = relay
            .transfers()
            .relay_upload(&transfer_id, &client_filename, &payload)
            .await?;
        return Ok(Json(json!({
            "status": "completed",
            "transfer_id": transfer_id,
            "filename": filename,
        })));
    }

    Err(RelayError::InvalidInput("no file part".to_string()))
}

/// `GET /download/:transfer_id`: the staged payload as an attachment.
pub async fn download_handler(
    Extension(relay): Extension<Arc<BurrowRelay>>,
    Path(transfer_id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let transfer_id: TransferId = parse_id(&transfer_id, "transfer")?;
    let payload = relay.transfers().staged_payload(&transfer_id).await?;

    let disposition = format!("attachment; filename=\"{}\"", payload.filename);
    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        payload.bytes,
    ))
}
