//! Axum server setup and router configuration.

use crate::api;
use crate::state::AppState;
use axum::http::{HeaderValue, Method, header, header::InvalidHeaderValue};
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build the main application router, nested under `path_prefix` when one
/// is configured and wrapped in `cors` when given.
pub fn build_router(
    state: AppState,
    path_prefix: Option<&str>,
    cors: Option<CorsLayer>,
) -> Router {
    let routes = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        .merge(api::router());

    let routes = match normalize_prefix(path_prefix) {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    };

    let router = routes.with_state(state);
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// CORS policy for browser clients. `"*"` allows any origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(HeaderValue::from_str(origin)?)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// `"/api/"` becomes `"/api"`; empty and `"/"` mean no prefix.
fn normalize_prefix(prefix: Option<&str>) -> Option<String> {
    let trimmed = prefix?.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server until `shutdown` completes, then stop accepting
/// connections and wait for open ones to finish.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(None), None);
        assert_eq!(normalize_prefix(Some("")), None);
        assert_eq!(normalize_prefix(Some("/")), None);
        assert_eq!(normalize_prefix(Some("/api/")).as_deref(), Some("/api"));
        assert_eq!(normalize_prefix(Some("v1")).as_deref(), Some("/v1"));
    }

    #[test]
    fn test_cors_layer_rejects_invalid_origin() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("https://app.example").is_ok());
        assert!(cors_layer("https://bad\norigin").is_err());
    }
}
