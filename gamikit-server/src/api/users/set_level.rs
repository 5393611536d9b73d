use axum::{Json, extract::State};
use gamikit_core::{Metric, UserId};
use gamikit_sdk::objects::{OkResponse, SetLevelRequest};

use crate::api::extractors::{ApiJson, ApiPath};
use crate::api::ApiError;
use crate::state::AppState;

/// `PUT /users/{user_id}/levels/{metric}` - administrative level override.
pub(super) async fn set_level(
    State(state): State<AppState>,
    ApiPath((user, metric)): ApiPath<(UserId, Metric)>,
    ApiJson(body): ApiJson<SetLevelRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.service.set_level(&user, &metric, body.level).await?;
    Ok(Json(OkResponse { ok: true }))
}
