//! Transfer request and approval workflow.
//!
//! ```text
//! TransferRequest: pending --approve--> approved
//! ActiveTransfer:  ready --> transferring --> completed
//!                                        \--> cancelled
//! ```
//!
//! Transfer status is tracked independently of the data path. Peers report
//! progress for direct transfers; the fallback upload drives it for relayed
//! ones. `completed` and `cancelled` are terminal: any later mutation is
//! rejected and leaves the record untouched.

use burrow_types::{RequestId, ServerEvent, TransferId, TransferMode, TransferStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{RelayError, Result};
use crate::notify::{ChannelHandle, Notifier};
use crate::peers::PeerRegistry;
use crate::server::RelayMetrics;
use crate::storage::{sanitize_filename, PayloadStore};

/// Approval state of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for the receiver.
    Pending,
    /// Approved; an [`ActiveTransfer`] exists.
    Approved,
}

/// A sender's offer to transfer one file.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    /// Request identifier.
    pub request_id: RequestId,
    /// Sending user.
    pub sender_id: String,
    /// Receiving user.
    pub receiver_id: String,
    /// Offered file name.
    pub filename: String,
    /// Approval state.
    pub status: RequestStatus,
    /// Transfer created on approval.
    pub transfer_id: Option<TransferId>,
    /// When the request was made.
    pub created_at: DateTime<Utc>,
}

/// An approved transfer.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveTransfer {
    /// Transfer identifier.
    pub transfer_id: TransferId,
    /// Request this transfer was approved from.
    pub request_id: RequestId,
    /// Sending user.
    pub sender_id: String,
    /// Receiving user.
    pub receiver_id: String,
    /// Offered file name.
    pub filename: String,
    /// Lifecycle state.
    pub status: TransferStatus,
    /// Percent complete, 0 to 100.
    pub progress: u8,
    /// Data path in use.
    pub transfer_mode: TransferMode,
    /// When the request was approved.
    pub created_at: DateTime<Utc>,
    /// When the transfer completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Staged payload, only for relayed transfers.
    pub stored_path: Option<PathBuf>,
    /// A fallback upload holds the transfer; no second one may start.
    #[serde(skip)]
    pub upload_in_flight: bool,
}

/// Result of [`TransferWorkflow::request`].
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome {
    /// New request.
    pub request_id: RequestId,
    /// Whether the receiver had an online peer.
    pub receiver_online: bool,
}

/// Result of [`TransferWorkflow::approve`].
#[derive(Debug, Clone, Copy)]
pub struct ApproveOutcome {
    /// Transfer created (or previously created) for the request.
    pub transfer_id: TransferId,
    /// Whether the sender had an online peer.
    pub sender_online: bool,
}

/// A staged payload ready for download.
#[derive(Debug)]
pub struct StagedPayload {
    /// File name on disk.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Request and transfer registries plus their notifications.
#[derive(Debug)]
pub struct TransferWorkflow {
    requests: DashMap<RequestId, TransferRequest>,
    transfers: DashMap<TransferId, ActiveTransfer>,
    peers: Arc<PeerRegistry>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn PayloadStore>,
    metrics: Arc<RelayMetrics>,
}

impl TransferWorkflow {
    /// Create an empty workflow.
    pub fn new(
        peers: Arc<PeerRegistry>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn PayloadStore>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            requests: DashMap::new(),
            transfers: DashMap::new(),
            peers,
            notifier,
            store,
            metrics,
        }
    }

    /// Record a transfer request and tell the receiver's devices about it.
    ///
    /// An offline receiver is not an error; it is reported in the outcome.
    pub async fn request(
        &self,
        sender_id: &str,
        receiver_id: &str,
        filename: &str,
    ) -> RequestOutcome {
        let request_id = RequestId::new();
        self.requests.insert(
            request_id,
            TransferRequest {
                request_id,
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                filename: filename.to_string(),
                status: RequestStatus::Pending,
                transfer_id: None,
                created_at: Utc::now(),
            },
        );

        tracing::info!(
            "New transfer request: {} - {} -> {} - {}",
            request_id,
            sender_id,
            receiver_id,
            filename
        );

        let presence = self.peers.presence(receiver_id).await;
        self.notifier.broadcast(
            &presence.channels,
            &ServerEvent::TransferRequest {
                request_id,
                sender_id: sender_id.to_string(),
                filename: filename.to_string(),
            },
        );

        RequestOutcome {
            request_id,
            receiver_online: presence.online,
        }
    }

    /// Approve a pending request, creating a `ready` transfer.
    ///
    /// Approving an already approved request returns the same transfer.
    pub async fn approve(&self, request_id: &RequestId) -> Result<ApproveOutcome> {
        let (transfer_id, sender_id, newly_approved) = {
            let mut request = self
                .requests
                .get_mut(request_id)
                .ok_or_else(|| RelayError::not_found("transfer request", request_id))?;

            match request.transfer_id {
                Some(transfer_id) => (transfer_id, request.sender_id.clone(), false),
                None => {
                    let transfer_id = TransferId::new();
                    self.transfers.insert(
                        transfer_id,
                        ActiveTransfer {
                            transfer_id,
                            request_id: *request_id,
                            sender_id: request.sender_id.clone(),
                            receiver_id: request.receiver_id.clone(),
                            filename: request.filename.clone(),
                            status: TransferStatus::Ready,
                            progress: 0,
                            transfer_mode: TransferMode::PeerDirect,
                            created_at: Utc::now(),
                            completed_at: None,
                            stored_path: None,
                            upload_in_flight: false,
                        },
                    );
                    request.status = RequestStatus::Approved;
                    request.transfer_id = Some(transfer_id);
                    (transfer_id, request.sender_id.clone(), true)
                }
            }
        };

        let presence = self.peers.presence(&sender_id).await;
        if newly_approved {
            tracing::info!(
                "Transfer request approved: {} -> Transfer ID: {}",
                request_id,
                transfer_id
            );
            self.notifier.broadcast(
                &presence.channels,
                &ServerEvent::TransferApproved {
                    request_id: *request_id,
                    transfer_id,
                },
            );
        }

        Ok(ApproveOutcome {
            transfer_id,
            sender_online: presence.online,
        })
    }

    /// Snapshot of a transfer.
    pub fn get(&self, transfer_id: &TransferId) -> Result<ActiveTransfer> {
        self.transfers
            .get(transfer_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| RelayError::not_found("transfer", transfer_id))
    }

    /// Snapshot of a request.
    pub fn get_request(&self, request_id: &RequestId) -> Result<TransferRequest> {
        self.requests
            .get(request_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RelayError::not_found("transfer request", request_id))
    }

    /// Apply a status/progress report from a peer.
    ///
    /// `completed` stamps `completed_at` and notifies both parties;
    /// `cancelled` takes the [`cancel`](Self::cancel) path.
    pub async fn update_status(
        &self,
        transfer_id: &TransferId,
        status: TransferStatus,
        progress: u8,
    ) -> Result<()> {
        if progress > 100 {
            return Err(RelayError::InvalidInput(format!(
                "progress must be between 0 and 100, got {}",
                progress
            )));
        }
        if status == TransferStatus::Cancelled {
            return self.cancel(transfer_id).await;
        }

        let completed = {
            let mut transfer = self.transfer_mut(transfer_id)?;
            transfer.status = status;
            transfer.progress = progress;
            if status == TransferStatus::Completed {
                transfer.completed_at = Some(Utc::now());
                Some((
                    transfer.sender_id.clone(),
                    transfer.receiver_id.clone(),
                    transfer.transfer_mode,
                ))
            } else {
                None
            }
        };

        if let Some((sender_id, receiver_id, transfer_mode)) = completed {
            self.metrics
                .transfers_completed
                .fetch_add(1, Ordering::Relaxed);
            tracing::info!("Transfer completed: {}", transfer_id);

            let channels = self.party_channels(&sender_id, &receiver_id).await;
            self.notifier.broadcast(
                &channels,
                &ServerEvent::TransferCompleted {
                    transfer_id: *transfer_id,
                    filename: None,
                    transfer_mode,
                },
            );
        }
        Ok(())
    }

    /// Cancel a transfer, purging any staged payload.
    ///
    /// Works from `ready` and `transferring`; a terminal transfer is left
    /// untouched and the call fails with `InvalidTransition`.
    pub async fn cancel(&self, transfer_id: &TransferId) -> Result<()> {
        let (sender_id, receiver_id, staged) = {
            let mut transfer = self.transfer_mut(transfer_id)?;
            transfer.status = TransferStatus::Cancelled;
            let staged = match transfer.transfer_mode {
                TransferMode::ServerRelay => transfer.stored_path.take(),
                TransferMode::PeerDirect => None,
            };
            (
                transfer.sender_id.clone(),
                transfer.receiver_id.clone(),
                staged,
            )
        };

        if let Some(path) = staged {
            match self.store.purge(&path).await {
                Ok(_) => tracing::debug!("Purged staged payload {}", path.display()),
                Err(e) => tracing::error!("Failed to purge {}: {}", path.display(), e),
            }
        }

        self.metrics
            .transfers_cancelled
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!("Transfer cancelled: {}", transfer_id);

        let channels = self.party_channels(&sender_id, &receiver_id).await;
        self.notifier.broadcast(
            &channels,
            &ServerEvent::TransferCancelled {
                transfer_id: *transfer_id,
            },
        );
        Ok(())
    }

    /// Claim a transfer for a fallback upload and switch it to the server
    /// relay path before its payload is staged.
    ///
    /// Only one upload may hold the claim; a second one fails with
    /// `InvalidTransition` until the first records or aborts.
    pub fn begin_relay_fallback(&self, transfer_id: &TransferId) -> Result<ActiveTransfer> {
        let mut transfer = self.transfer_mut(transfer_id)?;
        if transfer.upload_in_flight {
            return Err(RelayError::InvalidTransition {
                transfer_id: *transfer_id,
                status: transfer.status,
            });
        }
        transfer.upload_in_flight = true;
        transfer.transfer_mode = TransferMode::ServerRelay;
        transfer.status = TransferStatus::Transferring;
        Ok(transfer.value().clone())
    }

    /// Release the upload claim after staging failed.
    pub fn abort_relay_fallback(&self, transfer_id: &TransferId) {
        if let Some(mut transfer) = self.transfers.get_mut(transfer_id) {
            transfer.upload_in_flight = false;
        }
    }

    /// Mark a relayed transfer complete once its payload is staged.
    ///
    /// Fails with `InvalidTransition` if the transfer was cancelled while the
    /// payload was being written; the caller owns the staged file then.
    pub async fn record_relay_fallback(
        &self,
        transfer_id: &TransferId,
        stored_path: PathBuf,
        staged_name: &str,
    ) -> Result<()> {
        let receiver_id = {
            let mut transfer = self.transfer_mut(transfer_id)?;
            transfer.transfer_mode = TransferMode::ServerRelay;
            transfer.status = TransferStatus::Completed;
            transfer.progress = 100;
            transfer.completed_at = Some(Utc::now());
            transfer.stored_path = Some(stored_path);
            transfer.upload_in_flight = false;
            transfer.receiver_id.clone()
        };

        self.metrics
            .transfers_completed
            .fetch_add(1, Ordering::Relaxed);

        let presence = self.peers.presence(&receiver_id).await;
        self.notifier.broadcast(
            &presence.channels,
            &ServerEvent::TransferCompleted {
                transfer_id: *transfer_id,
                filename: Some(staged_name.to_string()),
                transfer_mode: TransferMode::ServerRelay,
            },
        );
        Ok(())
    }

    /// Stage a fallback upload and complete the transfer.
    ///
    /// Returns the sanitized file name the payload was stored under.
    pub async fn relay_upload(
        &self,
        transfer_id: &TransferId,
        client_filename: &str,
        payload: &[u8],
    ) -> Result<String> {
        // Existence first: an unknown transfer is 404 even without a file.
        self.get(transfer_id)?;
        let filename = sanitize_filename(client_filename)
            .ok_or_else(|| RelayError::InvalidInput("no selected file".to_string()))?;

        self.begin_relay_fallback(transfer_id)?;
        let path = match self.store.stage(transfer_id, &filename, payload).await {
            Ok(path) => path,
            Err(e) => {
                self.abort_relay_fallback(transfer_id);
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .record_relay_fallback(transfer_id, path.clone(), &filename)
            .await
        {
            // Cancelled mid-upload: do not leave the payload behind.
            if let Err(purge) = self.store.purge(&path).await {
                tracing::error!("Failed to purge {}: {}", path.display(), purge);
            }
            return Err(e);
        }

        self.metrics
            .bytes_uploaded
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        tracing::info!("File uploaded for transfer {}: {}", transfer_id, filename);
        Ok(filename)
    }

    /// Fetch the staged payload of a completed relayed transfer.
    pub async fn staged_payload(&self, transfer_id: &TransferId) -> Result<StagedPayload> {
        let transfer = self.get(transfer_id)?;
        let path = match (transfer.status, transfer.stored_path) {
            (TransferStatus::Completed, Some(path)) => path,
            _ => return Err(RelayError::not_found("staged payload", transfer_id)),
        };

        let bytes = self
            .store
            .load(&path)
            .await?
            .ok_or_else(|| RelayError::not_found("staged payload", transfer_id))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| transfer.filename.clone());

        tracing::info!("File download initiated for transfer {}", transfer_id);
        Ok(StagedPayload { filename, bytes })
    }

    /// Number of transfers tracked.
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    /// True if no transfer is tracked.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Mutable access to a non-terminal transfer.
    fn transfer_mut(
        &self,
        transfer_id: &TransferId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, TransferId, ActiveTransfer>> {
        let transfer = self
            .transfers
            .get_mut(transfer_id)
            .ok_or_else(|| RelayError::not_found("transfer", transfer_id))?;
        if transfer.status.is_terminal() {
            return Err(RelayError::InvalidTransition {
                transfer_id: *transfer_id,
                status: transfer.status,
            });
        }
        Ok(transfer)
    }

    /// Channels of both parties' online peers, without duplicates.
    async fn party_channels(&self, sender_id: &str, receiver_id: &str) -> Vec<ChannelHandle> {
        let mut channels = self.peers.presence(sender_id).await.channels;
        if receiver_id != sender_id {
            channels.extend(self.peers.presence(receiver_id).await.channels);
        }
        channels
    }
}
