use axum::{Json, extract::State};
use gamikit_core::{Metric, UserId};
use gamikit_sdk::objects::{AddPointsRequest, AddPointsResponse};

use crate::api::extractors::{ApiJson, ApiPath};
use crate::api::ApiError;
use crate::state::AppState;

/// `POST /users/{user_id}/points` - apply a signed delta.
///
/// The metric defaults to `xp`. Every threshold the change crosses is
/// applied before the response is sent.
pub(super) async fn add_points(
    State(state): State<AppState>,
    ApiPath(user): ApiPath<UserId>,
    ApiJson(body): ApiJson<AddPointsRequest>,
) -> Result<Json<AddPointsResponse>, ApiError> {
    let metric = body.metric.map(Metric::new).unwrap_or_else(Metric::xp);
    let total = state.service.add_points(&user, &metric, body.delta).await?;
    Ok(Json(AddPointsResponse { total }))
}
