//! Process-local store backed by a sharded concurrent map.
//!
//! Each user's record lives behind one `DashMap` entry, so every mutation
//! holds that entry's shard lock for the duration of a read-modify-write.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::trace;

use super::Store;
use crate::entities::{Badge, Metric, UserId, UserState};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct UserRecord {
    points: BTreeMap<Metric, i64>,
    badges: BTreeSet<Badge>,
    levels: BTreeMap<Metric, i64>,
    updated_at: Option<OffsetDateTime>,
}

impl UserRecord {
    fn touch(&mut self) {
        self.updated_at = Some(OffsetDateTime::now_utc());
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<UserId, UserRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with at least one recorded mutation.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add_points(&self, user: &UserId, metric: &Metric, delta: i64) -> Result<i64, StoreError> {
        if delta == 0 {
            return Err(StoreError::zero_delta());
        }
        let mut record = self.users.entry(user.clone()).or_default();
        let current = record.points.get(metric).copied().unwrap_or(0);
        let total = current.checked_add(delta).ok_or_else(|| StoreError::Overflow {
            user: user.clone(),
            metric: metric.clone(),
        })?;
        record.points.insert(metric.clone(), total);
        record.touch();
        trace!(%user, %metric, delta, total, "Points applied");
        Ok(total)
    }

    async fn award_badge(&self, user: &UserId, badge: &Badge) -> Result<bool, StoreError> {
        let mut record = self.users.entry(user.clone()).or_default();
        let inserted = record.badges.insert(badge.clone());
        if inserted {
            record.touch();
        }
        Ok(inserted)
    }

    async fn set_level(&self, user: &UserId, metric: &Metric, level: i64) -> Result<(), StoreError> {
        let mut record = self.users.entry(user.clone()).or_default();
        record.levels.insert(metric.clone(), level);
        record.touch();
        Ok(())
    }

    async fn raise_level(&self, user: &UserId, metric: &Metric, level: i64) -> Result<bool, StoreError> {
        let mut record = self.users.entry(user.clone()).or_default();
        match record.levels.get(metric) {
            Some(current) if *current >= level => Ok(false),
            _ => {
                record.levels.insert(metric.clone(), level);
                record.touch();
                Ok(true)
            }
        }
    }

    async fn get_state(&self, user: &UserId) -> Result<UserState, StoreError> {
        let read_at = OffsetDateTime::now_utc();
        let Some(record) = self.users.get(user) else {
            return Ok(UserState::empty(user.clone(), read_at));
        };
        Ok(UserState {
            user_id: user.clone(),
            points: record.points.clone(),
            badges: record.badges.clone(),
            levels: record.levels.clone(),
            updated_at: record.updated_at.unwrap_or(read_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn alice() -> UserId {
        UserId::from("alice")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_sum_exactly() {
        let store = Arc::new(MemoryStore::new());
        let mut tasks = Vec::new();
        for delta in 1..=10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.add_points(&alice(), &Metric::xp(), delta).await
            }));
        }

        let mut totals = Vec::new();
        for task in tasks {
            totals.push(task.await.unwrap().unwrap());
        }
        totals.sort_unstable();
        totals.dedup();

        // Every increment observed a distinct total.
        assert_eq!(totals.len(), 10);
        assert_eq!(totals.last(), Some(&55));
        let state = store.get_state(&alice()).await.unwrap();
        assert_eq!(state.points("xp"), 55);
    }

    #[tokio::test]
    async fn test_zero_delta_rejected_without_mutation() {
        let store = MemoryStore::new();
        let err = store.add_points(&alice(), &Metric::xp(), 0).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_overflow_leaves_total_unchanged() {
        let store = MemoryStore::new();
        store.add_points(&alice(), &Metric::xp(), i64::MAX).await.unwrap();
        let err = store.add_points(&alice(), &Metric::xp(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Overflow { .. }));

        let state = store.get_state(&alice()).await.unwrap();
        assert_eq!(state.points("xp"), i64::MAX);
        assert_eq!(store.add_points(&alice(), &Metric::xp(), -1).await.unwrap(), i64::MAX - 1);
    }

    #[tokio::test]
    async fn test_metrics_are_independent() {
        let store = MemoryStore::new();
        store.add_points(&alice(), &Metric::xp(), 10).await.unwrap();
        store.add_points(&alice(), &"coins".into(), -3).await.unwrap();

        let state = store.get_state(&alice()).await.unwrap();
        assert_eq!(state.points("xp"), 10);
        assert_eq!(state.points("coins"), -3);
    }

    #[tokio::test]
    async fn test_badge_award_is_idempotent() {
        let store = MemoryStore::new();
        let badge = Badge::from("pioneer");
        assert!(store.award_badge(&alice(), &badge).await.unwrap());
        assert!(!store.award_badge(&alice(), &badge).await.unwrap());

        let state = store.get_state(&alice()).await.unwrap();
        assert_eq!(state.badges.len(), 1);
    }

    #[tokio::test]
    async fn test_raise_level_never_lowers() {
        let store = MemoryStore::new();
        let xp = Metric::xp();
        assert!(store.raise_level(&alice(), &xp, 3).await.unwrap());
        assert!(!store.raise_level(&alice(), &xp, 2).await.unwrap());
        assert!(!store.raise_level(&alice(), &xp, 3).await.unwrap());
        assert_eq!(store.get_state(&alice()).await.unwrap().level("xp"), Some(3));

        // Direct overrides bypass monotonicity.
        store.set_level(&alice(), &xp, 1).await.unwrap();
        assert_eq!(store.get_state(&alice()).await.unwrap().level("xp"), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_user_reads_empty_state() {
        let store = MemoryStore::new();
        let before = OffsetDateTime::now_utc();
        let state = store.get_state(&"ghost".into()).await.unwrap();
        let after = OffsetDateTime::now_utc();

        assert!(state.points.is_empty());
        assert!(state.badges.is_empty());
        assert!(state.levels.is_empty());
        assert!(before <= state.updated_at && state.updated_at <= after);
    }

    #[tokio::test]
    async fn test_updated_at_tracks_last_mutation() {
        let store = MemoryStore::new();
        store.add_points(&alice(), &Metric::xp(), 5).await.unwrap();
        let first = store.get_state(&alice()).await.unwrap().updated_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // Reads do not move it.
        assert_eq!(store.get_state(&alice()).await.unwrap().updated_at, first);

        store.award_badge(&alice(), &"pioneer".into()).await.unwrap();
        assert!(store.get_state(&alice()).await.unwrap().updated_at > first);
    }
}
