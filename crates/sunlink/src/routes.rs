// Route table for the bridge's own HTTP surface.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use sunlink_core::BridgeState;

use crate::handlers;

pub fn router(state: Arc<BridgeState>, public_dir: &Path) -> Router {
    Router::new()
        .route("/api/login", post(handlers::login))
        .route("/api/status", post(handlers::status))
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
