//! Axum application wiring.

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::deps::ServerDeps;

use super::routes;

/// Shared state for the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
}

/// Build the router: health + per-job SSE progress streams.
pub fn build_app(deps: ServerDeps, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/streams/:user_id/:job_id",
            get(routes::stream::stream_progress),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { deps })
}
