//! Router configuration for the web server.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::ws;
use super::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let covers_dir = state.covers_dir.clone();

    Router::new()
        // Health checks
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        // News
        .route("/api/news", get(handlers::list_news))
        .route("/api/news/refresh", post(handlers::refresh_news))
        .route("/api/news/:id", get(handlers::get_news))
        .route("/api/news/:id/summarize", post(handlers::summarize_news))
        // Bookmarks
        .route(
            "/api/bookmarks",
            get(handlers::list_bookmarks)
                .post(handlers::create_bookmark),
        )
        .route("/api/bookmarks/:article_id", delete(handlers::delete_bookmark))
        // Cover generation
        .route("/api/covers", post(handlers::create_cover))
        .route("/api/covers/styles", get(handlers::list_styles))
        .route("/api/covers/:id", get(handlers::get_cover))
        // Ratings and derived preferences
        .route("/api/ratings", post(handlers::create_rating))
        .route("/api/preferences", get(handlers::get_preferences))
        // Status notifications
        .route("/ws", get(ws::ws_handler))
        // Generated covers
        .nest_service("/covers", ServeDir::new(covers_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
