use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use compact_str::CompactString;
use tokio::sync::RwLock;

use super::{Leaderboard, LeaderboardEntry};
use crate::entities::UserId;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Board {
    scores: HashMap<UserId, i64>,
    /// Rank order: highest score first, then user id ascending.
    order: BTreeSet<(Reverse<i64>, UserId)>,
}

impl Board {
    fn set(&mut self, user: &UserId, score: i64) {
        if let Some(previous) = self.scores.insert(user.clone(), score) {
            self.order.remove(&(Reverse(previous), user.clone()));
        }
        self.order.insert((Reverse(score), user.clone()));
    }

    fn rank_of(&self, user: &UserId, score: i64) -> u64 {
        let key = (Reverse(score), user.clone());
        self.order.range(..key).count() as u64 + 1
    }
}

#[derive(Debug)]
pub struct MemoryLeaderboard {
    name: CompactString,
    board: RwLock<Board>,
}

impl MemoryLeaderboard {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            board: RwLock::new(Board::default()),
        }
    }
}

#[async_trait]
impl Leaderboard for MemoryLeaderboard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update(&self, user: &UserId, score: i64) -> Result<(), StoreError> {
        self.board.write().await.set(user, score);
        Ok(())
    }

    async fn increment(&self, user: &UserId, delta: i64) -> Result<i64, StoreError> {
        let mut board = self.board.write().await;
        let current = board.scores.get(user).copied().unwrap_or(0);
        let score = current.checked_add(delta).ok_or_else(|| StoreError::ScoreOverflow {
            user: user.clone(),
            board: self.name.clone(),
        })?;
        board.set(user, score);
        Ok(score)
    }

    async fn get(&self, user: &UserId) -> Result<Option<LeaderboardEntry>, StoreError> {
        let board = self.board.read().await;
        Ok(board.scores.get(user).map(|&score| LeaderboardEntry {
            user: user.clone(),
            score,
            rank: board.rank_of(user, score),
        }))
    }

    async fn remove(&self, user: &UserId) -> Result<bool, StoreError> {
        let mut board = self.board.write().await;
        match board.scores.remove(user) {
            Some(score) => {
                board.order.remove(&(Reverse(score), user.clone()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn top_n(&self, n: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let board = self.board.read().await;
        Ok(board
            .order
            .iter()
            .take(n)
            .zip(1u64..)
            .map(|((Reverse(score), user), rank)| LeaderboardEntry {
                user: user.clone(),
                score: *score,
                rank,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.board.read().await.scores.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(entries: &[LeaderboardEntry]) -> Vec<(&str, i64, u64)> {
        entries
            .iter()
            .map(|e| (e.user.as_str(), e.score, e.rank))
            .collect()
    }

    #[tokio::test]
    async fn test_top_n_orders_by_score_then_user() {
        let board = MemoryLeaderboard::new("xp");
        board.update(&"carol".into(), 50).await.unwrap();
        board.update(&"bob".into(), 80).await.unwrap();
        board.update(&"alice".into(), 50).await.unwrap();
        board.update(&"dave".into(), 10).await.unwrap();

        let top = board.top_n(3).await.unwrap();
        assert_eq!(
            ids(&top),
            vec![("bob", 80, 1), ("alice", 50, 2), ("carol", 50, 3)]
        );
        assert_eq!(board.top_n(10).await.unwrap().len(), 4);
        assert!(board.top_n(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_previous_score() {
        let board = MemoryLeaderboard::new("xp");
        board.update(&"alice".into(), 10).await.unwrap();
        board.update(&"bob".into(), 20).await.unwrap();
        board.update(&"alice".into(), 30).await.unwrap();

        assert_eq!(board.len().await.unwrap(), 2);
        let alice = board.get(&"alice".into()).await.unwrap().unwrap();
        assert_eq!((alice.score, alice.rank), (30, 1));
        let bob = board.get(&"bob".into()).await.unwrap().unwrap();
        assert_eq!(bob.rank, 2);
    }

    #[tokio::test]
    async fn test_remove_and_missing_user() {
        let board = MemoryLeaderboard::new("xp");
        board.update(&"alice".into(), 10).await.unwrap();

        assert!(board.remove(&"alice".into()).await.unwrap());
        assert!(!board.remove(&"alice".into()).await.unwrap());
        assert_eq!(board.get(&"alice".into()).await.unwrap(), None);
        assert!(board.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_ties_break_bytewise() {
        let board = MemoryLeaderboard::new("xp");
        board.update(&"bob".into(), 5).await.unwrap();
        board.update(&"Zed".into(), 5).await.unwrap();

        let top = board.top_n(2).await.unwrap();
        assert_eq!(ids(&top), vec![("Zed", 5, 1), ("bob", 5, 2)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_converge() {
        let board = Arc::new(MemoryLeaderboard::new("xp"));
        let mut tasks = Vec::new();
        for delta in 1..=10 {
            let board = board.clone();
            tasks.push(tokio::spawn(async move {
                board.increment(&"alice".into(), delta).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let alice = board.get(&"alice".into()).await.unwrap().unwrap();
        assert_eq!(alice.score, 55);
    }

    #[tokio::test]
    async fn test_increment_overflow_keeps_score() {
        let board = MemoryLeaderboard::new("season-1");
        board.update(&"alice".into(), i64::MAX).await.unwrap();
        let err = board.increment(&"alice".into(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::ScoreOverflow { .. }));
        assert_eq!(
            err.to_string(),
            "score overflow for user alice on leaderboard season-1"
        );
        assert_eq!(board.get(&"alice".into()).await.unwrap().unwrap().score, i64::MAX);
    }
}
