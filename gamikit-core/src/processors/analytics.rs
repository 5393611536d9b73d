//! Daily active users.
//!
//! A user counts as active on a UTC day when any event about them carries a
//! timestamp on that day.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use time::Date;

use crate::entities::UserId;
use crate::events::{Event, EventBus, EventHandler, Subscription};

#[derive(Debug, Default)]
pub struct DailyActiveUsers {
    days: DashMap<Date, HashSet<UserId>>,
}

impl DailyActiveUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &Event) {
        let day = event.timestamp().to_offset(time::UtcOffset::UTC).date();
        self.days
            .entry(day)
            .or_default()
            .insert(event.user_id().clone());
    }

    /// Distinct users seen on `day`.
    pub fn count(&self, day: Date) -> usize {
        self.days.get(&day).map_or(0, |users| users.len())
    }

    /// Subscribe to every event kind on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<Subscription> {
        bus.subscribe_all(self.clone())
    }
}

#[async_trait]
impl EventHandler for DailyActiveUsers {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.record(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "daily_active_users"
    }
}
