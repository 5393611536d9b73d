//! Per-user endpoints: points, badges, levels and state.

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

mod add_points;
mod award_badge;
mod get_state;
mod set_level;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}", get(get_state::get_state))
        .route("/users/{user_id}/points", post(add_points::add_points))
        .route(
            "/users/{user_id}/badges/{badge}",
            post(award_badge::award_badge),
        )
        .route(
            "/users/{user_id}/levels/{metric}",
            put(set_level::set_level),
        )
}
