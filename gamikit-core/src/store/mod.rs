//! Persistence contract for per-user points, badges and levels.
//!
//! Every backend must make `add_points` linearizable per (user, metric):
//! the orchestrator derives the previous total as `new_total - delta`, so
//! two concurrent increments must never observe the same starting value.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::entities::{Badge, Metric, UserId, UserState};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Atomically add `delta` and return the new total. Unknown keys start
    /// at zero. Fails with `InvalidArgument` on a zero delta and `Overflow`
    /// when the sum leaves the `i64` range; neither mutates anything.
    async fn add_points(&self, user: &UserId, metric: &Metric, delta: i64) -> Result<i64, StoreError>;

    /// Add `badge` to the user's set. Returns `true` when it was not there.
    async fn award_badge(&self, user: &UserId, badge: &Badge) -> Result<bool, StoreError>;

    /// Unconditionally overwrite the level (last writer wins).
    async fn set_level(&self, user: &UserId, metric: &Metric, level: i64) -> Result<(), StoreError>;

    /// Store `level` only if it is higher than the current one (or none is
    /// stored). Returns whether anything changed.
    async fn raise_level(&self, user: &UserId, metric: &Metric, level: i64) -> Result<bool, StoreError>;

    /// Everything recorded for `user`. Never fails for an unknown user.
    async fn get_state(&self, user: &UserId) -> Result<UserState, StoreError>;
}
