//! Application state shared across all request handlers.

use gamikit_core::processors::{DailyActiveUsers, LeaderboardUpdater, RealtimeHub};
use gamikit_core::{GamifyService, Leaderboard, Metric};
use std::sync::Arc;
use tokio::sync::watch;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub service: GamifyService,
    /// The board fed from [`AppState::new`]'s `metric`.
    pub leaderboard: Arc<dyn Leaderboard>,
    /// Fan-out to `/ws` sessions.
    pub realtime: RealtimeHub,
    pub dau: Arc<DailyActiveUsers>,
    /// Flips to `true` once the server starts shutting down. Long-lived
    /// connections watch it to close themselves.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Create the state and attach the built-in hooks to the service's bus:
    /// the leaderboard updater for `metric`, the realtime hub and the daily
    /// active users counter.
    pub fn new(
        service: GamifyService,
        leaderboard: Arc<dyn Leaderboard>,
        metric: Metric,
        realtime: RealtimeHub,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let bus = service.bus();
        let dau = Arc::new(DailyActiveUsers::new());

        LeaderboardUpdater::new(leaderboard.clone(), metric).attach(bus);
        realtime.attach(bus);
        dau.attach(bus);

        Self {
            service,
            leaderboard,
            realtime,
            dau,
            shutdown,
        }
    }
}
