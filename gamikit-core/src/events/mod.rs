//! Domain events and their delivery.
//!
//! # Event Flow
//!
//! 1. `GamifyService` commits a store write and publishes one `Event`
//! 2. `EventBus` hands it to every handler subscribed to its `EventKind`
//! 3. Handlers (leaderboard updater, analytics, realtime hub) react
//!    independently; their failures stay inside the bus

pub mod bus;
pub mod channels;
pub mod types;

pub use bus::{
    handler_fn, DispatchMode, EventBus, EventHandler, FnHandler, OverflowPolicy, Subscription,
    DEFAULT_MAX_IN_FLIGHT,
};
pub use channels::{
    event_message_channel, EventMessageReceiver, EventMessageSender, DEFAULT_CHANNEL_BUFFER,
};
pub use types::{Event, EventKind};
