use compact_str::CompactString;
use kanau::processor::Processor;
use time::OffsetDateTime;

use crate::entities::{Badge, UserId};
use crate::framework::DatabaseProcessor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserBadgeRow {
    pub badge: CompactString,
    pub awarded_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Add a badge to a user's set.
///
/// Returns `true` only when the row did not exist before.
pub struct InsertUserBadge {
    pub user: UserId,
    pub badge: Badge,
}

impl Processor<InsertUserBadge> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertUserBadge")]
    async fn process(&self, insert: InsertUserBadge) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_badges (user_id, badge)
            VALUES ($1, $2)
            ON CONFLICT (user_id, badge) DO NOTHING
            "#,
        )
        .bind(insert.user.as_str())
        .bind(insert.badge.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetUserBadges {
    pub user: UserId,
}

impl Processor<GetUserBadges> for DatabaseProcessor {
    type Output = Vec<UserBadgeRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserBadges")]
    async fn process(&self, query: GetUserBadges) -> Result<Vec<UserBadgeRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, UserBadgeRow>(
            r#"
            SELECT badge, awarded_at
            FROM user_badges
            WHERE user_id = $1
            "#,
        )
        .bind(query.user.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
