pub mod leaderboard_entries;
pub mod user_badges;
pub mod user_levels;
pub mod user_points;

use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;
use gamikit_sdk::objects::UserStateResponse;
use time::OffsetDateTime;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(CompactString);

        impl $name {
            pub fn new(value: impl Into<CompactString>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn into_inner(self) -> CompactString {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl From<CompactString> for $name {
            fn from(value: CompactString) -> Self {
                Self(value)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

string_id!(
    /// Opaque user identifier. Ordering is byte-wise lexicographic, which
    /// is also the leaderboard tie-break order.
    UserId
);
string_id!(
    /// Name of an independently tracked counter, e.g. `xp` or `coins`.
    Metric
);
string_id!(
    /// Badge or achievement identifier held in a user's badge set.
    Badge
);

impl Metric {
    pub fn xp() -> Self {
        Self::new(gamikit_sdk::objects::DEFAULT_METRIC)
    }
}

/// Snapshot of everything recorded for one user.
///
/// A user without any activity is represented by empty collections and an
/// `updated_at` equal to the time of the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub user_id: UserId,
    pub points: BTreeMap<Metric, i64>,
    pub badges: BTreeSet<Badge>,
    pub levels: BTreeMap<Metric, i64>,
    pub updated_at: OffsetDateTime,
}

impl UserState {
    pub fn empty(user_id: UserId, read_at: OffsetDateTime) -> Self {
        Self {
            user_id,
            points: BTreeMap::new(),
            badges: BTreeSet::new(),
            levels: BTreeMap::new(),
            updated_at: read_at,
        }
    }

    pub fn points(&self, metric: &str) -> i64 {
        self.points.get(metric).copied().unwrap_or(0)
    }

    pub fn level(&self, metric: &str) -> Option<i64> {
        self.levels.get(metric).copied()
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.contains(badge)
    }
}

impl From<UserState> for UserStateResponse {
    fn from(value: UserState) -> Self {
        UserStateResponse {
            user_id: value.user_id.into_inner(),
            points: value
                .points
                .into_iter()
                .map(|(m, p)| (m.into_inner(), p))
                .collect(),
            badges: value.badges.into_iter().map(Badge::into_inner).collect(),
            levels: value
                .levels
                .into_iter()
                .map(|(m, l)| (m.into_inner(), l))
                .collect(),
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_orders_bytewise() {
        let mut ids = vec![UserId::from("bob"), UserId::from("Zed"), UserId::from("alice")];
        ids.sort();
        let ids: Vec<&str> = ids.iter().map(UserId::as_str).collect();
        assert_eq!(ids, vec!["Zed", "alice", "bob"]);
    }

    #[test]
    fn test_state_lookups_by_str() {
        let mut state = UserState::empty("alice".into(), OffsetDateTime::now_utc());
        state.points.insert(Metric::xp(), 40);
        state.badges.insert(Badge::from("early_bird"));

        assert_eq!(state.points("xp"), 40);
        assert_eq!(state.points("coins"), 0);
        assert_eq!(state.level("xp"), None);
        assert!(state.has_badge("early_bird"));
    }
}
