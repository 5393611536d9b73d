//! WebSocket message types for the realtime event stream.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket connection and pushes
//! [`WsServerMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. Every domain event published after the upgrade is sent as an
//!    [`EventMessage`] frame.
//! 2. If the connection falls behind the server's broadcast buffer, the
//!    skipped events are reported once with a [`WsServerMessage::Lagged`]
//!    frame and streaming continues with the newest events.
//! 3. On server shutdown a close frame with [`WsCloseCode::GOING_AWAY`]
//!    is sent.

use serde::{Deserialize, Serialize};

use super::events::EventMessage;

/// Server-to-client WebSocket message.
///
/// Untagged so that event frames are exactly the event wire shape:
///
/// ```json
/// {"type":"badge_awarded","user_id":"alice","badge":"early_bird","timestamp":"..."}
/// {"lagged":12}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WsServerMessage {
    /// A domain event.
    Event(EventMessage),

    /// The connection missed `lagged` events.
    Lagged { lagged: u64 },
}

/// Well-known WebSocket close codes used by the event stream.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// The server is shutting down.
    pub const GOING_AWAY: u16 = 1001;

    /// An unexpected server-side error prevented the connection from
    /// continuing.
    pub const INTERNAL_ERROR: u16 = 1011;
}
