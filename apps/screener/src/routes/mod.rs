pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

/// Upload cap for one screening request (all resumes together).
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Screening API
        .route(
            "/api/v1/screenings",
            post(handlers::handle_create_screening).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/screenings/cancel", post(handlers::handle_cancel))
        .route("/api/v1/screenings/live", get(handlers::handle_live))
        .route(
            "/api/v1/screenings/live/stream",
            get(handlers::handle_live_stream),
        )
        .route("/api/v1/credentials", get(handlers::handle_credentials))
        .with_state(state)
}
