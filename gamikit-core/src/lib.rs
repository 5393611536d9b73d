#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod entities;
pub mod error;
pub mod events;
pub mod framework;
pub mod leaderboard;
pub mod processors;
pub mod rules;
pub mod service;
pub mod store;

pub use entities::{Badge, Metric, UserId, UserState};
pub use error::{EngineError, StoreError};
pub use events::{DispatchMode, Event, EventBus, EventKind, OverflowPolicy};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use rules::{Outcome, RuleConfigError, RuleEngine, Threshold};
pub use service::GamifyService;
pub use store::Store;
