//! The public mutation API.
//!
//! [`GamifyService`] sequences one store write, the rule evaluation it
//! triggers, the derived writes and the events announcing them. The store's
//! atomic increment is the only ordering source: each call derives its
//! previous total from the total it committed, so concurrent calls on one
//! key partition the crossed thresholds between them without overlap.
//!
//! Cancelling a call means dropping its future. A store write that has not
//! committed is abandoned; events already published stay published.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::entities::{Badge, Metric, UserId, UserState};
use crate::error::{EngineError, StoreError};
use crate::events::{Event, EventBus};
use crate::rules::{Outcome, RuleEngine, Threshold};
use crate::store::Store;

#[derive(Clone)]
pub struct GamifyService {
    store: Arc<dyn Store>,
    rules: Arc<RuleEngine>,
    bus: EventBus,
}

impl std::fmt::Debug for GamifyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamifyService")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl GamifyService {
    pub fn new(store: Arc<dyn Store>, rules: RuleEngine, bus: EventBus) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Add `delta` to the user's `metric` and apply every threshold the
    /// change crosses.
    ///
    /// Publishes `PointsAdded` first, then for each crossed threshold in
    /// ascending order its write followed by its event. Every crossed level
    /// threshold announces `LevelUp`, but the stored level only ever moves
    /// up. A badge or achievement is announced only on its first award.
    pub async fn add_points(
        &self,
        user: &UserId,
        metric: &Metric,
        delta: i64,
    ) -> Result<i64, EngineError> {
        if delta == 0 {
            return Err(StoreError::zero_delta().into());
        }
        validate_name(user.as_str(), "user id must not be empty")?;
        validate_name(metric.as_str(), "metric must not be empty")?;

        let total = self.store.add_points(user, metric, delta).await?;
        let previous = total - delta;
        debug!(%user, %metric, delta, previous, total, "Points committed");

        self.bus
            .publish(
                Event::points_added(user.clone(), metric.clone(), delta)
                    .with_metadata("total", total),
            )
            .await;

        for threshold in self.rules.evaluate(metric.as_str(), previous, total) {
            if let Err(source) = self.apply_threshold(user, threshold).await {
                warn!(
                    %user,
                    %metric,
                    boundary = threshold.boundary,
                    outcome = %threshold.outcome,
                    error = %source,
                    "Applying crossed threshold failed after points were committed"
                );
                return Err(EngineError::PartialFailure {
                    committed_total: total,
                    outcome: threshold.outcome.clone(),
                    source,
                });
            }
        }

        Ok(total)
    }

    async fn apply_threshold(&self, user: &UserId, threshold: &Threshold) -> Result<(), StoreError> {
        let metric = &threshold.metric;
        match &threshold.outcome {
            Outcome::Level(level) => {
                let raised = self.store.raise_level(user, metric, *level).await?;
                if raised {
                    info!(%user, %metric, level, "Level up");
                } else {
                    debug!(%user, %metric, level, "Level threshold crossed at or below stored level");
                }
                self.bus
                    .publish(
                        Event::level_up(user.clone(), metric.clone(), *level)
                            .with_metadata("boundary", threshold.boundary)
                            .with_metadata("raised", raised),
                    )
                    .await;
            }
            Outcome::Badge(badge) => {
                if self.store.award_badge(user, badge).await? {
                    info!(%user, %badge, "Badge awarded by threshold");
                    self.bus
                        .publish(
                            Event::badge_awarded(user.clone(), badge.clone())
                                .with_metadata("boundary", threshold.boundary)
                                .with_metadata("metric", metric.as_str()),
                        )
                        .await;
                }
            }
            Outcome::Achievement(achievement) => {
                if self.store.award_badge(user, achievement).await? {
                    info!(%user, %achievement, "Achievement unlocked");
                    self.bus
                        .publish(
                            Event::achievement_unlocked(
                                user.clone(),
                                Some(metric.clone()),
                                achievement.clone(),
                            )
                            .with_metadata("boundary", threshold.boundary),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Award a badge directly. Returns `true` on the first award, which is
    /// the only case that publishes `BadgeAwarded`.
    pub async fn award_badge(&self, user: &UserId, badge: &Badge) -> Result<bool, EngineError> {
        validate_name(user.as_str(), "user id must not be empty")?;
        validate_name(badge.as_str(), "badge must not be empty")?;

        let awarded = self.store.award_badge(user, badge).await?;
        if awarded {
            info!(%user, %badge, "Badge awarded");
            self.bus
                .publish(Event::badge_awarded(user.clone(), badge.clone()))
                .await;
        } else {
            debug!(%user, %badge, "Badge already held");
        }
        Ok(awarded)
    }

    /// Administrative override. Bypasses level monotonicity and always
    /// publishes `LevelUp`.
    pub async fn set_level(
        &self,
        user: &UserId,
        metric: &Metric,
        level: i64,
    ) -> Result<(), EngineError> {
        validate_name(user.as_str(), "user id must not be empty")?;
        validate_name(metric.as_str(), "metric must not be empty")?;

        self.store.set_level(user, metric, level).await?;
        info!(%user, %metric, level, "Level overridden");
        self.bus
            .publish(
                Event::level_up(user.clone(), metric.clone(), level).with_metadata("override", true),
            )
            .await;
        Ok(())
    }

    pub async fn get_state(&self, user: &UserId) -> Result<UserState, EngineError> {
        Ok(self.store.get_state(user).await?)
    }
}

fn validate_name(value: &str, message: &'static str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::InvalidArgument(message));
    }
    Ok(())
}
