pub mod config;
pub mod db;
pub mod dispatcher;
pub mod http;
pub mod poller;
pub mod registry;
pub mod repo;
pub mod session;
pub mod source;
pub mod state;

pub use state::AppState;

use axum::{routing::get, Router};
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Routes shared by every deployment. With `static_dir` set, any path not
/// matched here is served from that directory, and unknown files fall back to
/// its `index.html` so client-side routing works.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route(sw_protocol::VIEWER_WS_PATH, get(session::ws_viewer_handler))
        .route("/health", get(http::health::health))
        .route("/api/v1/events", get(http::events::recent_events))
        .route("/api/emergency-data", get(http::events::recent_events))
        .route("/api/*rest", get(http::response::api_not_found))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
