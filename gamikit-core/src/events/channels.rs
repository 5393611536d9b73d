//! Channel factories for pushing events out of the process.
//!
//! The bus itself is handler based; these channels fan event messages out to
//! long-lived consumers such as WebSocket sessions.

use gamikit_sdk::objects::EventMessage;
use tokio::sync::broadcast;

/// Default buffer size for event channels.
///
/// Receivers falling further behind than this skip ahead and are told how
/// many messages they missed.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for wire-shaped events.
pub type EventMessageSender = broadcast::Sender<EventMessage>;
/// Receiver handle for wire-shaped events.
pub type EventMessageReceiver = broadcast::Receiver<EventMessage>;

/// Create a broadcast channel for wire-shaped events.
///
/// A `capacity` of zero falls back to [`DEFAULT_CHANNEL_BUFFER`].
pub fn event_message_channel(capacity: usize) -> (EventMessageSender, EventMessageReceiver) {
    let capacity = if capacity == 0 {
        DEFAULT_CHANNEL_BUFFER
    } else {
        capacity
    };
    broadcast::channel(capacity)
}
