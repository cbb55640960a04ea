use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // TMDB proxies
        .route("/movies/trending", get(handlers::trending))
        .route("/movies/search", get(handlers::search))
        .route("/movies/now_playing", get(handlers::now_playing))
        .route("/movies/streaming_trending", get(handlers::streaming_trending))
        .route("/movies/providers", get(handlers::provider_catalog))
        .route("/movies/by_person", get(handlers::by_person))
        // Mood discovery
        .route("/movies/mood/:mood_key", get(handlers::mood_discover))
        // Keep the parameterized detail route after the fixed /movies/* paths
        .route("/movies/:id", get(handlers::movie_detail))
        // Admin
        .route("/moods/refresh", post(handlers::moods_refresh))
        .route(
            "/moods/config",
            get(handlers::moods_config).post(handlers::moods_config_update),
        )
        .route("/moods/pins", post(handlers::moods_pins_update))
        .route(
            "/moods/keywords",
            get(handlers::moods_keywords).post(handlers::moods_keywords_update),
        )
        .route("/moods/seed", post(handlers::moods_seed))
        .route("/moods/clear_snapshots", post(handlers::moods_clear_snapshots))
        .layer(
            TraceLayer::new_for_http().make_span_with(make_span_with_request_id),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
