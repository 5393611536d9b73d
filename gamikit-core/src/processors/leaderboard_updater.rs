//! Keeps a leaderboard in step with `PointsAdded` events of one metric.
//!
//! Scores are applied as increments, so the board converges to the metric
//! totals regardless of the order asynchronous dispatch delivers events in.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::entities::Metric;
use crate::events::{Event, EventBus, EventHandler, EventKind, Subscription};
use crate::leaderboard::Leaderboard;

pub struct LeaderboardUpdater {
    board: Arc<dyn Leaderboard>,
    metric: Metric,
}

impl LeaderboardUpdater {
    pub fn new(board: Arc<dyn Leaderboard>, metric: Metric) -> Self {
        Self { board, metric }
    }

    /// Subscribe to `PointsAdded` on `bus`.
    pub fn attach(self, bus: &EventBus) -> Subscription {
        bus.subscribe(EventKind::PointsAdded, Arc::new(self))
    }
}

#[async_trait]
impl EventHandler for LeaderboardUpdater {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        if event.metric() != Some(&self.metric) {
            return Ok(());
        }
        let Some(delta) = event.delta() else {
            return Ok(());
        };
        let score = self.board.increment(event.user_id(), delta).await?;
        debug!(
            board = self.board.name(),
            user_id = %event.user_id(),
            delta,
            score,
            "Leaderboard score updated"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "leaderboard_updater"
    }
}
