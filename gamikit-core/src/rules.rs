//! Threshold rules.
//!
//! A [`RuleEngine`] owns a static table of [`Threshold`]s grouped by metric
//! and sorted by boundary. [`RuleEngine::evaluate`] is a pure lookup: given
//! the totals before and after one update it returns every threshold with
//! `previous < boundary <= new`, in ascending boundary order. Negative or
//! zero movements never cross anything.

use std::collections::HashMap;

use smallvec::SmallVec;
use thiserror::Error;

use crate::entities::{Badge, Metric};

/// What happens when a threshold is crossed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Raise the metric's level to this value.
    Level(i64),
    /// Award a badge.
    Badge(Badge),
    /// Unlock an achievement (persisted in the badge set).
    Achievement(Badge),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Level(level) => write!(f, "level {level}"),
            Outcome::Badge(badge) => write!(f, "badge {badge}"),
            Outcome::Achievement(id) => write!(f, "achievement {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Threshold {
    pub metric: Metric,
    pub boundary: i64,
    pub outcome: Outcome,
}

impl Threshold {
    pub fn level(metric: impl Into<Metric>, boundary: i64, level: i64) -> Self {
        Self {
            metric: metric.into(),
            boundary,
            outcome: Outcome::Level(level),
        }
    }

    pub fn badge(metric: impl Into<Metric>, boundary: i64, badge: impl Into<Badge>) -> Self {
        Self {
            metric: metric.into(),
            boundary,
            outcome: Outcome::Badge(badge.into()),
        }
    }

    pub fn achievement(metric: impl Into<Metric>, boundary: i64, id: impl Into<Badge>) -> Self {
        Self {
            metric: metric.into(),
            boundary,
            outcome: Outcome::Achievement(id.into()),
        }
    }
}

/// Rejected threshold table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleConfigError {
    #[error("threshold has an empty metric name")]
    EmptyMetric,

    #[error("threshold on {metric} at {boundary} has an empty badge or achievement id")]
    EmptyBadge { metric: Metric, boundary: i64 },

    #[error("boundaries on {metric} must be strictly increasing, got {previous} then {next}")]
    NonMonotonicBoundary {
        metric: Metric,
        previous: i64,
        next: i64,
    },

    #[error("levels on {metric} must not decrease, got {previous} then {next} at boundary {boundary}")]
    DecreasingLevel {
        metric: Metric,
        boundary: i64,
        previous: i64,
        next: i64,
    },
}

/// Crossed thresholds of one update. Most updates cross at most a few.
pub type Crossed<'a> = SmallVec<[&'a Threshold; 4]>;

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    /// Per-metric thresholds, sorted ascending by boundary.
    table: HashMap<Metric, Vec<Threshold>>,
}

impl RuleEngine {
    /// Build an engine from thresholds given in table order.
    ///
    /// Within each metric the thresholds must appear with strictly
    /// increasing boundaries, and level outcomes must be non-decreasing
    /// along the metric. Thresholds of different metrics may interleave.
    pub fn new(thresholds: impl IntoIterator<Item = Threshold>) -> Result<Self, RuleConfigError> {
        let mut table: HashMap<Metric, Vec<Threshold>> = HashMap::new();

        for threshold in thresholds {
            if threshold.metric.as_str().is_empty() {
                return Err(RuleConfigError::EmptyMetric);
            }
            if let Outcome::Badge(id) | Outcome::Achievement(id) = &threshold.outcome
                && id.as_str().is_empty()
            {
                return Err(RuleConfigError::EmptyBadge {
                    metric: threshold.metric.clone(),
                    boundary: threshold.boundary,
                });
            }

            let track = table.entry(threshold.metric.clone()).or_default();

            if let Some(last) = track.last()
                && last.boundary >= threshold.boundary
            {
                return Err(RuleConfigError::NonMonotonicBoundary {
                    metric: threshold.metric.clone(),
                    previous: last.boundary,
                    next: threshold.boundary,
                });
            }

            if let Outcome::Level(next) = threshold.outcome {
                let previous = track.iter().rev().find_map(|t| match t.outcome {
                    Outcome::Level(level) => Some(level),
                    _ => None,
                });
                if let Some(previous) = previous
                    && next < previous
                {
                    return Err(RuleConfigError::DecreasingLevel {
                        metric: threshold.metric.clone(),
                        boundary: threshold.boundary,
                        previous,
                        next,
                    });
                }
            }

            track.push(threshold);
        }

        Ok(Self { table })
    }

    /// Default XP ladder used when no rules are configured.
    pub fn default_ladder() -> Self {
        let xp = Metric::xp();
        let track = vec![
            Threshold::badge(xp.clone(), 1, "first_points"),
            Threshold::level(xp.clone(), 100, 2),
            Threshold::level(xp.clone(), 300, 3),
            Threshold::level(xp.clone(), 600, 4),
            Threshold::level(xp.clone(), 1_000, 5),
            Threshold::achievement(xp.clone(), 5_000, "xp_5000"),
        ];
        Self {
            table: HashMap::from([(xp, track)]),
        }
    }

    /// Every threshold of `metric` with `previous < boundary <= new`, in
    /// ascending boundary order.
    pub fn evaluate(&self, metric: &str, previous: i64, new: i64) -> Crossed<'_> {
        if new <= previous {
            return Crossed::new();
        }
        let Some(track) = self.table.get(metric) else {
            return Crossed::new();
        };

        // First boundary strictly above `previous`.
        let start = track.partition_point(|t| t.boundary <= previous);
        track[start..]
            .iter()
            .take_while(|t| t.boundary <= new)
            .collect()
    }

    pub fn thresholds(&self, metric: &str) -> &[Threshold] {
        self.table.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
