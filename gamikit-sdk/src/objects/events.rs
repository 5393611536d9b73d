//! Event wire shape shared by the realtime stream and analytics consumers.

use std::collections::BTreeMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of a domain event, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PointsAdded,
    LevelUp,
    BadgeAwarded,
    AchievementUnlocked,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::PointsAdded => write!(f, "points_added"),
            EventType::LevelUp => write!(f, "level_up"),
            EventType::BadgeAwarded => write!(f, "badge_awarded"),
            EventType::AchievementUnlocked => write!(f, "achievement_unlocked"),
        }
    }
}

/// JSON representation of a domain event.
///
/// ```json
/// {"type":"points_added","user_id":"alice","metric":"xp","points":50,
///  "timestamp":"2024-05-01T12:00:00Z"}
/// ```
///
/// Optional fields are omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub user_id: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<CompactString>,
    /// Signed delta for `points_added`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<CompactString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievement: Option<CompactString>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}
