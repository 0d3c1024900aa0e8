//! Persistent WebSocket channels.
//!
//! Each upgraded socket gets a [`Channel`]: a writer task drains the
//! channel's outbound queue onto the socket while the reader loop turns
//! inbound frames into relay events. Every inbound frame is acknowledged.

use crate::server::BurrowRelay;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Extension;
use burrow_types::{Ack, ClientEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

/// Longest frame excerpt included in a log line.
const LOG_EXCERPT_CHARS: usize = 120;

/// `GET /ws`: upgrade to a persistent channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(relay): Extension<Arc<BurrowRelay>>,
) -> impl IntoResponse {
    let max_frame = relay.config().signaling.max_frame_bytes;
    ws.max_message_size(max_frame)
        .on_upgrade(move |socket| Channel::new(relay, socket).run())
}

/// One persistent channel.
struct Channel {
    relay: Arc<BurrowRelay>,
    socket: WebSocket,
}

impl Channel {
    fn new(relay: Arc<BurrowRelay>, socket: WebSocket) -> Self {
        Self { relay, socket }
    }

    /// Run the channel until the socket closes.
    async fn run(self) {
        let Channel { relay, socket } = self;
        let (handle, mut outbound) = relay.open_channel();
        let channel_id = handle.id();
        tracing::debug!("Channel {} opened", channel_id);

        let (mut sink, mut stream) = socket.split();

        let writer = tokio::spawn(async move {
            while let Some(event) = outbound.recv().await {
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode {:?}: {}", event, e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                // Pings are answered by the socket itself.
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Channel {} read error: {}", channel_id, e);
                    break;
                }
            };

            let ack = match ClientEvent::from_json(&text) {
                Ok(event) => relay.handle_event(&handle, event).await,
                Err(e) => {
                    tracing::warn!(
                        "Malformed frame on channel {}: {} ({})",
                        channel_id,
                        e,
                        excerpt(&text, LOG_EXCERPT_CHARS)
                    );
                    Ack::error("unknown", e.to_string())
                }
            };
            relay.reply(&handle, ack);
        }

        relay.channel_closed(channel_id).await;
        writer.abort();
        tracing::debug!("Channel {} closed", channel_id);
    }
}

/// Truncate a frame for logging.
///
/// Uses char boundaries to avoid splitting multi-byte UTF-8.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
