use async_trait::async_trait;
use compact_str::CompactString;
use kanau::processor::Processor;
use sqlx::PgPool;

use super::{Leaderboard, LeaderboardEntry};
use crate::entities::leaderboard_entries::{
    CountLeaderboardEntries, DeleteLeaderboardEntry, GetLeaderboardEntry, GetLeaderboardTop,
    IncrementLeaderboardScore, RankedRow, UpsertLeaderboardScore,
};
use crate::entities::UserId;
use crate::error::StoreError;
use crate::framework::{is_out_of_range, DatabaseProcessor};

/// A named board stored in the shared `leaderboard_entries` table.
#[derive(Debug, Clone)]
pub struct PgLeaderboard {
    name: CompactString,
    db: DatabaseProcessor,
}

impl PgLeaderboard {
    pub fn new(pool: PgPool, name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            db: DatabaseProcessor::new(pool),
        }
    }
}

impl From<RankedRow> for LeaderboardEntry {
    fn from(row: RankedRow) -> Self {
        LeaderboardEntry {
            user: UserId::from(row.user_id),
            score: row.score,
            rank: u64::try_from(row.rank).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Leaderboard for PgLeaderboard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update(&self, user: &UserId, score: i64) -> Result<(), StoreError> {
        self.db
            .process(UpsertLeaderboardScore {
                board: self.name.clone(),
                user: user.clone(),
                score,
            })
            .await?;
        Ok(())
    }

    async fn increment(&self, user: &UserId, delta: i64) -> Result<i64, StoreError> {
        let result = self
            .db
            .process(IncrementLeaderboardScore {
                board: self.name.clone(),
                user: user.clone(),
                delta,
            })
            .await;
        match result {
            Ok(score) => Ok(score),
            Err(e) if is_out_of_range(&e) => Err(StoreError::ScoreOverflow {
                user: user.clone(),
                board: self.name.clone(),
            }),
            Err(e) => Err(StoreError::Unavailable(e)),
        }
    }

    async fn get(&self, user: &UserId) -> Result<Option<LeaderboardEntry>, StoreError> {
        let row = self
            .db
            .process(GetLeaderboardEntry {
                board: self.name.clone(),
                user: user.clone(),
            })
            .await?;
        Ok(row.map(LeaderboardEntry::from))
    }

    async fn remove(&self, user: &UserId) -> Result<bool, StoreError> {
        let removed = self
            .db
            .process(DeleteLeaderboardEntry {
                board: self.name.clone(),
                user: user.clone(),
            })
            .await?;
        Ok(removed)
    }

    async fn top_n(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let rows = self
            .db
            .process(GetLeaderboardTop {
                board: self.name.clone(),
                limit: i64::try_from(n).unwrap_or(i64::MAX),
            })
            .await?;
        Ok(rows.into_iter().map(LeaderboardEntry::from).collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let count = self
            .db
            .process(CountLeaderboardEntries {
                board: self.name.clone(),
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn test_ranking_matches_memory_order(pool: PgPool) {
        let board = PgLeaderboard::new(pool, "xp");
        board.update(&"carol".into(), 50).await.unwrap();
        board.update(&"bob".into(), 80).await.unwrap();
        board.update(&"alice".into(), 50).await.unwrap();
        board.update(&"Zed".into(), 50).await.unwrap();

        let top: Vec<(String, u64)> = board
            .top_n(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.user.to_string(), e.rank))
            .collect();
        assert_eq!(
            top,
            vec![
                ("bob".to_string(), 1),
                ("Zed".to_string(), 2),
                ("alice".to_string(), 3),
                ("carol".to_string(), 4),
            ]
        );

        let carol = board.get(&"carol".into()).await.unwrap().unwrap();
        assert_eq!(carol.rank, 4);
        assert_eq!(board.increment(&"carol".into(), 100).await.unwrap(), 150);
        assert_eq!(board.get(&"carol".into()).await.unwrap().unwrap().rank, 1);

        assert!(board.remove(&"bob".into()).await.unwrap());
        assert_eq!(board.len().await.unwrap(), 3);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn test_boards_are_isolated(pool: PgPool) {
        let xp = PgLeaderboard::new(pool.clone(), "xp");
        let coins = PgLeaderboard::new(pool, "coins");
        xp.update(&"alice".into(), 10).await.unwrap();

        assert_eq!(coins.get(&"alice".into()).await.unwrap(), None);
        assert_eq!(coins.len().await.unwrap(), 0);
    }
}
