//! Leaderboard endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use gamikit_core::UserId;
use gamikit_sdk::objects::{LeaderboardEntryResponse, TopQuery};

use crate::api::extractors::{ApiPath, ApiQuery};
use crate::api::ApiError;
use crate::state::AppState;

/// Upper bound on `limit`; larger requests are clamped.
const MAX_LIMIT: usize = 1000;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(top))
        .route("/leaderboard/{user_id}", get(entry))
}

/// `GET /leaderboard?limit=N` - the best `N` entries (default 10).
async fn top(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopQuery>,
) -> Result<Json<Vec<LeaderboardEntryResponse>>, ApiError> {
    let entries = state.leaderboard.top_n(query.limit.min(MAX_LIMIT)).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// `GET /leaderboard/{user_id}` - 404 when the user is not ranked.
async fn entry(
    State(state): State<AppState>,
    ApiPath(user): ApiPath<UserId>,
) -> Result<Json<LeaderboardEntryResponse>, ApiError> {
    let entry = state
        .leaderboard
        .get(&user)
        .await?
        .ok_or(ApiError::NotFound("user is not ranked"))?;
    Ok(Json(entry.into()))
}
