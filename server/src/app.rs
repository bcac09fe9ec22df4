use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/territories/compute",
            post(routes::compute::compute_territories),
        )
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
