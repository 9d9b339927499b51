pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

/// Resumes arrive as PDFs; allow more than axum's 2 MB default on the upload route.
const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/screenings",
            post(handlers::handle_create_screening),
        )
        .route(
            "/api/v1/screenings/upload",
            post(handlers::handle_upload_screening).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/screenings/:id",
            get(handlers::handle_get_screening).delete(handlers::handle_abandon_screening),
        )
        .route(
            "/api/v1/screenings/:id/answers",
            post(handlers::handle_submit_answer),
        )
        .route(
            "/api/v1/screenings/:id/save",
            post(handlers::handle_save_screening),
        )
        .with_state(state)
}
