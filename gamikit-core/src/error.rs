//! Error types surfaced by the store and the orchestrator.

use compact_str::CompactString;
use thiserror::Error;

use crate::entities::{Metric, UserId};
use crate::rules::Outcome;

/// Errors a [`Store`](crate::store::Store) backend can return.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request was rejected before touching storage.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Applying the delta would wrap the signed 64-bit counter.
    #[error("points overflow for user {user} on metric {metric}")]
    Overflow { user: UserId, metric: Metric },

    /// Applying the delta would wrap a leaderboard score.
    #[error("score overflow for user {user} on leaderboard {board}")]
    ScoreOverflow { user: UserId, board: CompactString },

    /// Backend connectivity or transaction failure.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn zero_delta() -> Self {
        StoreError::InvalidArgument("delta must be non-zero")
    }
}

/// Errors returned by [`GamifyService`](crate::service::GamifyService).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The base mutation failed; nothing was committed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The point delta committed, but applying a crossed threshold failed.
    ///
    /// Events published before the failure stand; remaining thresholds of
    /// the same call were not applied.
    #[error("points committed (total {committed_total}) but applying {outcome} failed: {source}")]
    PartialFailure {
        committed_total: i64,
        outcome: Outcome,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EngineError::Store(StoreError::InvalidArgument(_)))
    }

    pub fn is_overflow(&self) -> bool {
        matches!(
            self,
            EngineError::Store(StoreError::Overflow { .. } | StoreError::ScoreOverflow { .. })
        )
    }

    /// The total that was committed before a derived write failed.
    pub fn committed_total(&self) -> Option<i64> {
        match self {
            EngineError::PartialFailure {
                committed_total, ..
            } => Some(*committed_total),
            EngineError::Store(_) => None,
        }
    }
}
