//! User API request and response types.

use std::collections::{BTreeMap, BTreeSet};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Body of `POST /users/{id}/points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPointsRequest {
    /// Defaults to [`DEFAULT_METRIC`](super::DEFAULT_METRIC) when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<CompactString>,
    pub delta: i64,
}

/// Response of `POST /users/{id}/points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPointsResponse {
    pub total: i64,
}

/// Body of `PUT /users/{id}/levels/{metric}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLevelRequest {
    pub level: i64,
}

/// Response of `POST /users/{id}/badges/{badge}`.
///
/// `awarded` is `false` when the user already held the badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardBadgeResponse {
    pub ok: bool,
    pub awarded: bool,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Error body returned by every API endpoint on failure, including
/// malformed paths, query strings and request bodies.
///
/// `total` is only present when the point mutation itself committed but a
/// derived level or badge write failed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

/// Snapshot of a user's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStateResponse {
    pub user_id: CompactString,
    pub points: BTreeMap<CompactString, i64>,
    pub badges: BTreeSet<CompactString>,
    pub levels: BTreeMap<CompactString, i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_points_request_metric_is_optional() {
        let req: AddPointsRequest = serde_json::from_str(r#"{"delta": 25}"#).unwrap();
        assert_eq!(req.metric, None);
        assert_eq!(req.delta, 25);

        let req: AddPointsRequest =
            serde_json::from_str(r#"{"metric": "coins", "delta": -3}"#).unwrap();
        assert_eq!(req.metric.as_deref(), Some("coins"));
        assert_eq!(req.delta, -3);
    }

    #[test]
    fn test_error_response_omits_missing_total() {
        let body = ErrorResponse {
            error: "delta must be non-zero".to_string(),
            total: None,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"delta must be non-zero"}"#
        );
    }
}
