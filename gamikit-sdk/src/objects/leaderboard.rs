//! Leaderboard API types.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// One ranked row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntryResponse {
    pub user_id: CompactString,
    pub score: i64,
    /// 1-based rank without gaps over (score desc, user id asc).
    pub rank: u64,
}

/// Query string of `GET /leaderboard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for TopQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    10
}
