use axum::{Json, extract::State};
use gamikit_core::UserId;
use gamikit_sdk::objects::UserStateResponse;

use crate::api::extractors::ApiPath;
use crate::api::ApiError;
use crate::state::AppState;

/// `GET /users/{user_id}` - snapshot of the user's points, badges and
/// levels. Unknown users get an empty snapshot.
pub(super) async fn get_state(
    State(state): State<AppState>,
    ApiPath(user): ApiPath<UserId>,
) -> Result<Json<UserStateResponse>, ApiError> {
    let snapshot = state.service.get_state(&user).await?;
    Ok(Json(snapshot.into()))
}
