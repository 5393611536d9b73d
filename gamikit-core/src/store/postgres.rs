//! PostgreSQL store.
//!
//! Every mutation is a single upsert statement, so per-key atomicity comes
//! from the row lock Postgres takes on conflict.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::Store;
use crate::entities::user_badges::{GetUserBadges, InsertUserBadge};
use crate::entities::user_levels::{GetUserLevels, RaiseUserLevel, SetUserLevel};
use crate::entities::user_points::{AddUserPoints, GetUserPoints};
use crate::entities::{Badge, Metric, UserId, UserState};
use crate::error::StoreError;
use crate::framework::{is_out_of_range, DatabaseProcessor};

#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn add_points(&self, user: &UserId, metric: &Metric, delta: i64) -> Result<i64, StoreError> {
        if delta == 0 {
            return Err(StoreError::zero_delta());
        }
        let insert = AddUserPoints {
            user: user.clone(),
            metric: metric.clone(),
            delta,
        };
        match self.db.process(insert).await {
            Ok(total) => Ok(total),
            Err(e) if is_out_of_range(&e) => Err(StoreError::Overflow {
                user: user.clone(),
                metric: metric.clone(),
            }),
            Err(e) => Err(StoreError::Unavailable(e)),
        }
    }

    async fn award_badge(&self, user: &UserId, badge: &Badge) -> Result<bool, StoreError> {
        let inserted = self
            .db
            .process(InsertUserBadge {
                user: user.clone(),
                badge: badge.clone(),
            })
            .await?;
        Ok(inserted)
    }

    async fn set_level(&self, user: &UserId, metric: &Metric, level: i64) -> Result<(), StoreError> {
        self.db
            .process(SetUserLevel {
                user: user.clone(),
                metric: metric.clone(),
                level,
            })
            .await?;
        Ok(())
    }

    async fn raise_level(&self, user: &UserId, metric: &Metric, level: i64) -> Result<bool, StoreError> {
        let raised = self
            .db
            .process(RaiseUserLevel {
                user: user.clone(),
                metric: metric.clone(),
                level,
            })
            .await?;
        Ok(raised)
    }

    async fn get_state(&self, user: &UserId) -> Result<UserState, StoreError> {
        let read_at = OffsetDateTime::now_utc();
        let (points, badges, levels) = tokio::try_join!(
            self.db.process(GetUserPoints { user: user.clone() }),
            self.db.process(GetUserBadges { user: user.clone() }),
            self.db.process(GetUserLevels { user: user.clone() }),
        )?;

        let updated_at = points
            .iter()
            .map(|row| row.updated_at)
            .chain(badges.iter().map(|row| row.awarded_at))
            .chain(levels.iter().map(|row| row.updated_at))
            .max()
            .unwrap_or(read_at);

        Ok(UserState {
            user_id: user.clone(),
            points: points
                .into_iter()
                .map(|row| (Metric::from(row.metric), row.points))
                .collect::<BTreeMap<_, _>>(),
            badges: badges
                .into_iter()
                .map(|row| Badge::from(row.badge))
                .collect::<BTreeSet<_>>(),
            levels: levels
                .into_iter()
                .map(|row| (Metric::from(row.metric), row.level))
                .collect::<BTreeMap<_, _>>(),
            updated_at,
        })
    }
}
