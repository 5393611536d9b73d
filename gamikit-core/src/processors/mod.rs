//! Event handlers reacting to domain events.
//!
//! - `LeaderboardUpdater`: `PointsAdded` of one metric -> leaderboard increments
//! - `RealtimeHub`: every event -> broadcast channel for WebSocket sessions
//! - `DailyActiveUsers`: every event -> distinct users per UTC day

pub mod analytics;
pub mod leaderboard_updater;
pub mod realtime;

pub use analytics::DailyActiveUsers;
pub use leaderboard_updater::LeaderboardUpdater;
pub use realtime::RealtimeHub;
