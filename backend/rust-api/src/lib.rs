use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(app_state.config.cors_origin.as_deref());

    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api", stats_routes())
        .nest("/api/v1/matches", match_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn stats_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/game-stats", post(handlers::stats::save_game_stats))
        .route("/high-score", get(handlers::stats::get_high_score))
}

fn match_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::matches::create_match))
        .route("/{id}", get(handlers::matches::get_match))
        .route("/{id}/answers", post(handlers::matches::submit_answer))
        .route("/{id}/advance", post(handlers::matches::advance_match))
        .route("/{id}/end", post(handlers::matches::end_match))
        .route("/{id}/restart", post(handlers::matches::restart_match))
        .route("/{id}/stream", get(handlers::sse::match_stream))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(_)) => {
            tracing::warn!("Ignoring invalid CORS origin, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middlewares::trace::TRACE_ID_HEADER),
        ])
        .allow_origin(allow_origin)
}
