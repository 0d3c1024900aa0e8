//! # burrow-relay
//!
//! Rendezvous and fallback-relay server for BurrowSpace.
//!
//! This crate implements a server that:
//! - Registers peer devices and tracks their liveness
//! - Routes direct-connection negotiation payloads between peers
//! - Falls back to relaying data chunks when peers cannot connect directly
//! - Runs the request → approve → transfer → complete/cancel workflow
//! - Stages whole-file payloads when the direct path fails
//!
//! ## Architecture
//!
//! ```text
//! Peer A ──┐   HTTP + WebSocket   ┌── Peer B
//!          │                      │
//!      ┌───┴──────────────────────┴───┐
//!      │         burrow-relay         │
//!      │  peers · signals · relays    │
//!      │  transfers · payload store   │
//!      └──────────────────────────────┘
//! ```
//!
//! ## Channel protocol
//!
//! Persistent channels carry JSON frames `{"event": ..., "data": ...}`:
//! - `register_socket` binds the channel to a peer
//! - `peer_signal` forwards negotiation payloads (or opens a relay session)
//! - `relay_chunk` forwards a chunk through a relay session
//!
//! Every inbound frame is answered with an `ack`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod liveness;
pub mod notify;
pub mod peers;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod signal;
pub mod storage;
pub mod transfers;

pub use server::BurrowRelay;
