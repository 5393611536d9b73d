use compact_str::CompactString;
use kanau::processor::Processor;
use time::OffsetDateTime;

use crate::entities::{Metric, UserId};
use crate::framework::DatabaseProcessor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserPointsRow {
    pub metric: CompactString,
    pub points: i64,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Add `delta` to a user's counter, creating it at zero first if absent.
///
/// Returns the committed total. A result outside the `BIGINT` range is
/// rejected by Postgres with SQLSTATE `22003` and nothing is written.
pub struct AddUserPoints {
    pub user: UserId,
    pub metric: Metric,
    pub delta: i64,
}

impl Processor<AddUserPoints> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AddUserPoints")]
    async fn process(&self, insert: AddUserPoints) -> Result<i64, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO user_points (user_id, metric, points)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, metric) DO UPDATE
            SET points = user_points.points + EXCLUDED.points,
                updated_at = now()
            RETURNING points
            "#,
        )
        .bind(insert.user.as_str())
        .bind(insert.metric.as_str())
        .bind(insert.delta)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}

#[derive(Debug, Clone)]
/// All counters of one user, ordered by metric name.
pub struct GetUserPoints {
    pub user: UserId,
}

impl Processor<GetUserPoints> for DatabaseProcessor {
    type Output = Vec<UserPointsRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserPoints")]
    async fn process(&self, query: GetUserPoints) -> Result<Vec<UserPointsRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, UserPointsRow>(
            r#"
            SELECT metric, points, updated_at
            FROM user_points
            WHERE user_id = $1
            ORDER BY metric
            "#,
        )
        .bind(query.user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
