//! Persistent channel events.
//!
//! Frames are JSON text, adjacently tagged:
//!
//! ```json
//! {"event": "peer_signal", "data": {"sender_peer_id": "...", "target_peer_id": "...", "signal": {}}}
//! ```
//!
//! Negotiation signals and relay chunks are carried as opaque JSON values.
//! The server never inspects them.

use serde::{Deserialize, Serialize};

use crate::{PeerId, PeerRef, RequestId, SessionId, TransferId, TransferMode, TypesError};

/// Events sent by a peer to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this channel to a registered peer.
    RegisterSocket {
        /// Peer returned by `connect`.
        peer_id: PeerId,
    },
    /// Forward a negotiation payload to another peer.
    PeerSignal {
        /// Originating peer.
        sender_peer_id: PeerRef,
        /// Destination peer. Need not be registered.
        target_peer_id: PeerRef,
        /// Opaque negotiation payload.
        signal: serde_json::Value,
    },
    /// Forward one chunk through a relay session.
    RelayChunk {
        /// Session returned in `relay_initiated`.
        session_id: SessionId,
        /// Opaque chunk data.
        chunk: serde_json::Value,
        /// Zero-based chunk index.
        index: u64,
        /// Total number of chunks.
        total: u64,
    },
}

impl ClientEvent {
    /// Decode a text frame.
    pub fn from_json(text: &str) -> Result<Self, TypesError> {
        serde_json::from_str(text).map_err(TypesError::MalformedEvent)
    }

    /// Wire name of the event, echoed back in [`Ack::event`].
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RegisterSocket { .. } => "register_socket",
            ClientEvent::PeerSignal { .. } => "peer_signal",
            ClientEvent::RelayChunk { .. } => "relay_chunk",
        }
    }
}

/// Events pushed by the server to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A peer lost its channel.
    PeerDisconnected {
        /// The peer that went away.
        peer_id: PeerId,
    },
    /// Negotiation payload from another peer.
    PeerSignal {
        /// Originating peer, as the sender named itself.
        sender_peer_id: PeerRef,
        /// Opaque negotiation payload, unchanged.
        signal: serde_json::Value,
    },
    /// Direct signaling failed; chunks should go through this session.
    RelayInitiated {
        /// New relay session.
        session_id: SessionId,
        /// The unreachable peer, as the sender named it.
        target_peer_id: PeerRef,
    },
    /// Someone wants to send this user a file.
    TransferRequest {
        /// Request to approve.
        request_id: RequestId,
        /// Sending user.
        sender_id: String,
        /// Offered file name.
        filename: String,
    },
    /// The receiver approved a request.
    TransferApproved {
        /// The approved request.
        request_id: RequestId,
        /// Transfer created on approval.
        transfer_id: TransferId,
    },
    /// A transfer finished.
    TransferCompleted {
        /// The finished transfer.
        transfer_id: TransferId,
        /// Staged file name, present for relay uploads.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        /// Data path that was used.
        transfer_mode: TransferMode,
    },
    /// A transfer was cancelled.
    TransferCancelled {
        /// The cancelled transfer.
        transfer_id: TransferId,
    },
    /// One relayed chunk.
    RelayChunk {
        /// Relay session.
        session_id: SessionId,
        /// Opaque chunk data, unchanged.
        chunk: serde_json::Value,
        /// Zero-based chunk index.
        index: u64,
        /// Total number of chunks.
        total: u64,
    },
    /// Reply to an inbound [`ClientEvent`].
    Ack(Ack),
}

impl ServerEvent {
    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(TypesError::MalformedEvent)
    }
}

/// Outcome reported for an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Handled and delivered.
    Success,
    /// Target unreachable, relay session opened.
    Relay,
    /// Receiver unreachable, chunk accepted but not delivered.
    Queued,
    /// Rejected.
    Error,
}

/// Reply to an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Name of the event being answered.
    pub event: String,
    /// Outcome.
    pub status: AckStatus,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Relay session, when one was opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Ack {
    /// Plain success reply.
    pub fn success(event: &str) -> Self {
        Self {
            event: event.to_string(),
            status: AckStatus::Success,
            message: None,
            session_id: None,
        }
    }

    /// Error reply with a reason.
    pub fn error(event: &str, message: impl Into<String>) -> Self {
        Self {
            event: event.to_string(),
            status: AckStatus::Error,
            message: Some(message.into()),
            session_id: None,
        }
    }
}
