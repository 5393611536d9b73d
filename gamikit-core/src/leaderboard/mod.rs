//! Ranked scores per user.
//!
//! Entries are ordered by score descending, ties broken by ascending user id
//! (byte-wise). Ranks are 1-based and assigned over that order at read time.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use gamikit_sdk::objects::LeaderboardEntryResponse;

use crate::entities::UserId;
use crate::error::StoreError;

pub use memory::MemoryLeaderboard;
pub use postgres::PgLeaderboard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user: UserId,
    pub score: i64,
    pub rank: u64,
}

impl From<LeaderboardEntry> for LeaderboardEntryResponse {
    fn from(value: LeaderboardEntry) -> Self {
        LeaderboardEntryResponse {
            user_id: value.user.into_inner(),
            score: value.score,
            rank: value.rank,
        }
    }
}

#[async_trait]
pub trait Leaderboard: Send + Sync + 'static {
    /// Name of the board, used in logs and as the storage key.
    fn name(&self) -> &str;

    /// Set the user's score, inserting the user if absent.
    async fn update(&self, user: &UserId, score: i64) -> Result<(), StoreError>;

    /// Add `delta` to the user's score (starting from zero) and return the
    /// new score.
    async fn increment(&self, user: &UserId, delta: i64) -> Result<i64, StoreError>;

    async fn get(&self, user: &UserId) -> Result<Option<LeaderboardEntry>, StoreError>;

    /// Returns whether the user was present.
    async fn remove(&self, user: &UserId) -> Result<bool, StoreError>;

    /// The best `n` entries, at most as many as the board holds.
    async fn top_n(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}
