//! Lifecycle states shared between the server and its clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Liveness of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    /// Refreshed within the liveness timeout.
    Online,
    /// Disconnected, lost its channel, or timed out.
    Offline,
}

/// State of an approved transfer.
///
/// ```text
/// ready -> transferring -> completed
///                       \-> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Approved, no data moved yet.
    Ready,
    /// Data is moving, directly or through the server.
    Transferring,
    /// All data delivered.
    Completed,
    /// Cancelled by either party.
    Cancelled,
}

impl TransferStatus {
    /// Terminal states accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }

    /// Wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Ready => "ready",
            TransferStatus::Transferring => "transferring",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(TransferStatus::Ready),
            "transferring" => Ok(TransferStatus::Transferring),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(TypesError::UnknownStatus {
                kind: "transfer",
                value: other.to_string(),
            }),
        }
    }
}

/// Which data path a transfer used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// Peers negotiated a direct connection.
    #[serde(rename = "p2p")]
    PeerDirect,
    /// The payload was staged on the server.
    #[serde(rename = "server_relay")]
    ServerRelay,
}

/// State of a chunk relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    /// Opened, no chunk delivered yet.
    Initiated,
    /// At least one chunk delivered.
    Relaying,
    /// The final indexed chunk was delivered.
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TransferStatus::Ready.is_terminal());
        assert!(!TransferStatus::Transferring.is_terminal());
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
    }

    #[test]
    fn transfer_status_parses_wire_names() {
        assert_eq!(
            "transferring".parse::<TransferStatus>().unwrap(),
            TransferStatus::Transferring
        );
        assert!("paused".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn transfer_mode_uses_legacy_names() {
        assert_eq!(
            serde_json::to_string(&TransferMode::PeerDirect).unwrap(),
            "\"p2p\""
        );
        assert_eq!(
            serde_json::to_string(&TransferMode::ServerRelay).unwrap(),
            "\"server_relay\""
        );
    }

    #[test]
    fn peer_status_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&PeerStatus::Offline).unwrap(),
            "\"offline\""
        );
    }
}
