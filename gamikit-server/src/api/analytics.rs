use axum::{Json, extract::State};
use gamikit_sdk::objects::{DauQuery, DauResponse};
use time::OffsetDateTime;

use crate::api::extractors::ApiQuery;
use crate::state::AppState;

/// `GET /analytics/dau?date=YYYY-MM-DD` - distinct users with at least one
/// event on the given UTC day, today when omitted.
pub(super) async fn daily_active_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DauQuery>,
) -> Json<DauResponse> {
    let date = query
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());
    Json(DauResponse {
        date,
        count: state.dau.count(date),
    })
}
