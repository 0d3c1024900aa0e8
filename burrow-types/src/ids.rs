//! Identifier types for BurrowSpace.
//!
//! Every identifier is a random UUID v4, serialized as its hyphenated string.
//! Peers and clients treat them as opaque tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.simple().to_string()[..8])
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| TypesError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

uuid_id!(
    /// Identifies one connected endpoint. A user may own many peers.
    PeerId,
    "peer"
);

uuid_id!(
    /// Identifies a pending or approved transfer request.
    RequestId,
    "request"
);

uuid_id!(
    /// Identifies an approved transfer.
    TransferId,
    "transfer"
);

uuid_id!(
    /// Identifies a server-mediated relay session.
    SessionId,
    "session"
);

uuid_id!(
    /// Identifies one persistent channel (one WebSocket).
    ///
    /// Used to tell a superseded channel apart from the current one.
    ChannelId,
    "channel"
);

/// A peer named in a channel frame, kept exactly as the client wrote it.
///
/// Frames may name peers that were never registered, including strings that
/// are not UUIDs at all. Such a reference is valid on the wire but resolves
/// to no [`PeerId`], so it never reaches a channel.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerRef(String);

impl PeerRef {
    /// Wrap a raw peer reference.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The reference as sent.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The registered-peer id this names, if it parses as one.
    pub fn peer_id(&self) -> Option<PeerId> {
        self.0.parse().ok()
    }
}

impl From<PeerId> for PeerRef {
    fn from(id: PeerId) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<PeerId> for PeerRef {
    fn eq(&self, other: &PeerId) -> bool {
        self.peer_id().as_ref() == Some(other)
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerRef({:?})", self.0)
    }
}
