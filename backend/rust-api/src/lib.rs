#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS for the participant and judge single-page UIs
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Question catalog (read-only collaborator)
        .route("/api/v1/questions", get(handlers::questions::list_questions))
        // Participant progression engine
        .nest("/api/v1/progress", progress_routes().layer(cors.clone()))
        // Judge side of the submission handshake
        .nest("/api/v1/judge", judge_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn progress_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/{participant_id}", get(handlers::progress::get_state))
        .route("/{participant_id}/open", post(handlers::progress::open_session))
        .route("/{participant_id}/round", post(handlers::progress::select_round))
        .route(
            "/{participant_id}/question",
            post(handlers::progress::select_question),
        )
        .route("/{participant_id}/start", post(handlers::progress::start_question))
        .route(
            "/{participant_id}/submit",
            post(handlers::progress::submit_for_judgment),
        )
        .route("/{participant_id}/skip", post(handlers::progress::skip_question))
        .route("/{participant_id}/stream", get(handlers::sse::progress_stream))
}

fn judge_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/pending", get(handlers::judge::list_pending))
        .route("/verdict", post(handlers::judge::post_verdict))
}
