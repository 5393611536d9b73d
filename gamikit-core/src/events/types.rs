//! Event type definitions.
//!
//! Events are immutable once built. The orchestrator creates them after the
//! corresponding store write has committed, and the bus hands the same value
//! to every subscriber of its kind.

use std::collections::BTreeMap;

use gamikit_sdk::objects::{EventMessage, EventType};
use time::OffsetDateTime;

use crate::entities::{Badge, Metric, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    PointsAdded,
    LevelUp,
    BadgeAwarded,
    AchievementUnlocked,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::PointsAdded,
        EventKind::LevelUp,
        EventKind::BadgeAwarded,
        EventKind::AchievementUnlocked,
    ];
}

impl From<EventKind> for EventType {
    fn from(value: EventKind) -> Self {
        match value {
            EventKind::PointsAdded => EventType::PointsAdded,
            EventKind::LevelUp => EventType::LevelUp,
            EventKind::BadgeAwarded => EventType::BadgeAwarded,
            EventKind::AchievementUnlocked => EventType::AchievementUnlocked,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        EventType::from(*self).fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    user_id: UserId,
    metric: Option<Metric>,
    delta: Option<i64>,
    level: Option<i64>,
    badge: Option<Badge>,
    achievement: Option<Badge>,
    timestamp: OffsetDateTime,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl Event {
    fn bare(kind: EventKind, user_id: UserId) -> Self {
        Self {
            kind,
            user_id,
            metric: None,
            delta: None,
            level: None,
            badge: None,
            achievement: None,
            timestamp: OffsetDateTime::now_utc(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn points_added(user_id: UserId, metric: Metric, delta: i64) -> Self {
        Self {
            metric: Some(metric),
            delta: Some(delta),
            ..Self::bare(EventKind::PointsAdded, user_id)
        }
    }

    pub fn level_up(user_id: UserId, metric: Metric, level: i64) -> Self {
        Self {
            metric: Some(metric),
            level: Some(level),
            ..Self::bare(EventKind::LevelUp, user_id)
        }
    }

    pub fn badge_awarded(user_id: UserId, badge: Badge) -> Self {
        Self {
            badge: Some(badge),
            ..Self::bare(EventKind::BadgeAwarded, user_id)
        }
    }

    /// `metric` is the track whose threshold unlocked the achievement, if any.
    pub fn achievement_unlocked(user_id: UserId, metric: Option<Metric>, achievement: Badge) -> Self {
        Self {
            metric,
            achievement: Some(achievement),
            ..Self::bare(EventKind::AchievementUnlocked, user_id)
        }
    }

    /// Attach a metadata entry. Only usable while the event is still owned
    /// by its producer.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn metric(&self) -> Option<&Metric> {
        self.metric.as_ref()
    }

    pub fn delta(&self) -> Option<i64> {
        self.delta
    }

    pub fn level(&self) -> Option<i64> {
        self.level
    }

    pub fn badge(&self) -> Option<&Badge> {
        self.badge.as_ref()
    }

    pub fn achievement(&self) -> Option<&Badge> {
        self.achievement.as_ref()
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }
}

impl From<&Event> for EventMessage {
    fn from(event: &Event) -> Self {
        EventMessage {
            event_type: event.kind.into(),
            user_id: event.user_id.as_str().into(),
            metric: event.metric.as_ref().map(|m| m.as_str().into()),
            points: event.delta,
            level: event.level,
            badge: event.badge.as_ref().map(|b| b.as_str().into()),
            achievement: event.achievement.as_ref().map(|a| a.as_str().into()),
            timestamp: event.timestamp,
            metadata: event.metadata.clone(),
        }
    }
}
