//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /users/{user_id}/points`          – apply a point delta
//! - `POST /users/{user_id}/badges/{badge}`  – award a badge
//! - `PUT  /users/{user_id}/levels/{metric}` – administrative level override
//! - `GET  /users/{user_id}`                 – user state snapshot
//! - `GET  /leaderboard`                     – top ranked users
//! - `GET  /leaderboard/{user_id}`           – a single user's rank
//! - `GET  /analytics/dau`                   – daily active users
//! - `GET  /ws`                              – realtime event stream

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use gamikit_core::{EngineError, StoreError};
use gamikit_sdk::objects::ErrorResponse;

use crate::state::AppState;

mod analytics;
mod extractors;
mod leaderboard;
mod users;
mod ws;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(leaderboard::router())
        .route("/analytics/dau", get(analytics::daily_active_users))
        .route("/ws", get(ws::event_stream_ws))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    /// The engine rejected or failed the operation.
    Engine(EngineError),
    /// The requested resource does not exist.
    NotFound(&'static str),
    /// The request could not be parsed (path, query string or body).
    Rejected { status: StatusCode, message: String },
}

impl From<EngineError> for ApiError {
    fn from(value: EngineError) -> Self {
        ApiError::Engine(value)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Engine(value.into())
    }
}

fn error_body(status: StatusCode, error: String, total: Option<i64>) -> Response {
    (status, Json(ErrorResponse { error, total })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Engine(EngineError::Store(StoreError::InvalidArgument(msg))) => {
                error_body(StatusCode::BAD_REQUEST, msg.to_string(), None)
            }
            ApiError::Engine(EngineError::Store(
                e @ (StoreError::Overflow { .. } | StoreError::ScoreOverflow { .. }),
            )) => {
                error_body(StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None)
            }
            ApiError::Engine(EngineError::Store(StoreError::Unavailable(e))) => {
                tracing::error!(error = %e, "API storage error");
                error_body(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage unavailable".to_string(),
                    None,
                )
            }
            ApiError::Engine(e @ EngineError::PartialFailure { .. }) => {
                tracing::error!(error = %e, "API partial failure");
                let total = e.committed_total();
                error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), total)
            }
            ApiError::NotFound(what) => error_body(StatusCode::NOT_FOUND, what.to_string(), None),
            ApiError::Rejected { status, message } => error_body(status, message, None),
        }
    }
}
