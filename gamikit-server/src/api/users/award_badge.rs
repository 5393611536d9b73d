use axum::{Json, extract::State};
use gamikit_core::{Badge, UserId};
use gamikit_sdk::objects::AwardBadgeResponse;

use crate::api::extractors::ApiPath;
use crate::api::ApiError;
use crate::state::AppState;

/// `POST /users/{user_id}/badges/{badge}` - award a badge.
///
/// Re-awarding a held badge succeeds with `awarded: false`.
pub(super) async fn award_badge(
    State(state): State<AppState>,
    ApiPath((user, badge)): ApiPath<(UserId, Badge)>,
) -> Result<Json<AwardBadgeResponse>, ApiError> {
    let awarded = state.service.award_badge(&user, &badge).await?;
    Ok(Json(AwardBadgeResponse { ok: true, awarded }))
}
