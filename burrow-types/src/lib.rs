//! # burrow-types
//!
//! Shared types for the BurrowSpace rendezvous and relay server.
//!
//! This crate provides the vocabulary used on both sides of the wire:
//! - [`PeerId`], [`PeerRef`], [`RequestId`], [`TransferId`], [`SessionId`], [`ChannelId`] - Identifiers
//! - [`PeerStatus`], [`TransferStatus`], [`TransferMode`], [`RelayStatus`] - Lifecycle states
//! - [`ClientEvent`], [`ServerEvent`] - Persistent channel events
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod status;

pub use error::TypesError;
pub use events::{Ack, AckStatus, ClientEvent, ServerEvent};
pub use ids::{ChannelId, PeerId, PeerRef, RequestId, SessionId, TransferId};
pub use status::{PeerStatus, RelayStatus, TransferStatus, TransferMode};
