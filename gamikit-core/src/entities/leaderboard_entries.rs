//! Ranked scores, one table shared by every named board.
//!
//! Ranks are computed on read with `score DESC, user_id ASC`. User ids are
//! compared with `COLLATE "C"` so ties break byte-wise, matching the
//! in-memory board.

use compact_str::CompactString;
use kanau::processor::Processor;

use crate::entities::UserId;
use crate::framework::DatabaseProcessor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RankedRow {
    pub user_id: CompactString,
    pub score: i64,
    pub rank: i64,
}

#[derive(Debug, Clone)]
/// Replace a user's score on a board.
pub struct UpsertLeaderboardScore {
    pub board: CompactString,
    pub user: UserId,
    pub score: i64,
}

impl Processor<UpsertLeaderboardScore> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertLeaderboardScore")]
    async fn process(&self, update: UpsertLeaderboardScore) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard_entries (board, user_id, score)
            VALUES ($1, $2, $3)
            ON CONFLICT (board, user_id) DO UPDATE
            SET score = EXCLUDED.score,
                updated_at = now()
            "#,
        )
        .bind(update.board.as_str())
        .bind(update.user.as_str())
        .bind(update.score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Add to a user's score on a board, starting from zero. Returns the new score.
pub struct IncrementLeaderboardScore {
    pub board: CompactString,
    pub user: UserId,
    pub delta: i64,
}

impl Processor<IncrementLeaderboardScore> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:IncrementLeaderboardScore")]
    async fn process(&self, update: IncrementLeaderboardScore) -> Result<i64, sqlx::Error> {
        let score = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO leaderboard_entries (board, user_id, score)
            VALUES ($1, $2, $3)
            ON CONFLICT (board, user_id) DO UPDATE
            SET score = leaderboard_entries.score + EXCLUDED.score,
                updated_at = now()
            RETURNING score
            "#,
        )
        .bind(update.board.as_str())
        .bind(update.user.as_str())
        .bind(update.delta)
        .fetch_one(&self.pool)
        .await?;
        Ok(score)
    }
}

#[derive(Debug, Clone)]
/// A single user's score and 1-based rank.
pub struct GetLeaderboardEntry {
    pub board: CompactString,
    pub user: UserId,
}

impl Processor<GetLeaderboardEntry> for DatabaseProcessor {
    type Output = Option<RankedRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLeaderboardEntry")]
    async fn process(&self, query: GetLeaderboardEntry) -> Result<Option<RankedRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, RankedRow>(
            r#"
            SELECT
                e.user_id,
                e.score,
                1 + (
                    SELECT COUNT(*)
                    FROM leaderboard_entries o
                    WHERE o.board = e.board
                      AND (o.score > e.score
                           OR (o.score = e.score
                               AND o.user_id COLLATE "C" < e.user_id COLLATE "C"))
                ) AS rank
            FROM leaderboard_entries e
            WHERE e.board = $1 AND e.user_id = $2
            "#,
        )
        .bind(query.board.as_str())
        .bind(query.user.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteLeaderboardEntry {
    pub board: CompactString,
    pub user: UserId,
}

impl Processor<DeleteLeaderboardEntry> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteLeaderboardEntry")]
    async fn process(&self, delete: DeleteLeaderboardEntry) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM leaderboard_entries
            WHERE board = $1 AND user_id = $2
            "#,
        )
        .bind(delete.board.as_str())
        .bind(delete.user.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// The first `limit` entries of a board in rank order.
pub struct GetLeaderboardTop {
    pub board: CompactString,
    pub limit: i64,
}

impl Processor<GetLeaderboardTop> for DatabaseProcessor {
    type Output = Vec<RankedRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLeaderboardTop")]
    async fn process(&self, query: GetLeaderboardTop) -> Result<Vec<RankedRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RankedRow>(
            r#"
            SELECT
                user_id,
                score,
                ROW_NUMBER() OVER (ORDER BY score DESC, user_id COLLATE "C" ASC) AS rank
            FROM leaderboard_entries
            WHERE board = $1
            ORDER BY score DESC, user_id COLLATE "C" ASC
            LIMIT $2
            "#,
        )
        .bind(query.board.as_str())
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct CountLeaderboardEntries {
    pub board: CompactString,
}

impl Processor<CountLeaderboardEntries> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountLeaderboardEntries")]
    async fn process(&self, query: CountLeaderboardEntries) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM leaderboard_entries
            WHERE board = $1
            "#,
        )
        .bind(query.board.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
