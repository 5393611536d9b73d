use compact_str::CompactString;
use kanau::processor::Processor;
use time::OffsetDateTime;

use crate::entities::{Metric, UserId};
use crate::framework::DatabaseProcessor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserLevelRow {
    pub metric: CompactString,
    pub level: i64,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Overwrite a user's level on a metric.
pub struct SetUserLevel {
    pub user: UserId,
    pub metric: Metric,
    pub level: i64,
}

impl Processor<SetUserLevel> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetUserLevel")]
    async fn process(&self, update: SetUserLevel) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_levels (user_id, metric, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, metric) DO UPDATE
            SET level = EXCLUDED.level,
                updated_at = now()
            "#,
        )
        .bind(update.user.as_str())
        .bind(update.metric.as_str())
        .bind(update.level)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Set a user's level only if it is higher than the stored one.
///
/// Returns `true` when the row was inserted or raised.
pub struct RaiseUserLevel {
    pub user: UserId,
    pub metric: Metric,
    pub level: i64,
}

impl Processor<RaiseUserLevel> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RaiseUserLevel")]
    async fn process(&self, update: RaiseUserLevel) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_levels (user_id, metric, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, metric) DO UPDATE
            SET level = EXCLUDED.level,
                updated_at = now()
            WHERE user_levels.level < EXCLUDED.level
            "#,
        )
        .bind(update.user.as_str())
        .bind(update.metric.as_str())
        .bind(update.level)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetUserLevels {
    pub user: UserId,
}

impl Processor<GetUserLevels> for DatabaseProcessor {
    type Output = Vec<UserLevelRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserLevels")]
    async fn process(&self, query: GetUserLevels) -> Result<Vec<UserLevelRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, UserLevelRow>(
            r#"
            SELECT metric, level, updated_at
            FROM user_levels
            WHERE user_id = $1
            "#,
        )
        .bind(query.user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
