mod handlers;
mod multipart;

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};

use crate::core::state::AppState;

/// Answer files accepted in one submission request.
pub(crate) const MAX_FILES_PER_REQUEST: u64 = 20;

pub(crate) fn router(max_file_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_bytes.saturating_mul(MAX_FILES_PER_REQUEST))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/", post(handlers::create_test))
        .route("/:test_id", get(handlers::get_test))
        .route("/:test_id/submissions", post(handlers::submit_answers))
        .layer(DefaultBodyLimit::max(body_limit))
}

pub(crate) fn submissions_router() -> Router<AppState> {
    Router::new().route("/:submission_id", get(handlers::get_submission))
}

pub(crate) fn session_router() -> Router<AppState> {
    Router::new().route("/test/:test_id", get(handlers::session_view))
}

#[cfg(test)]
mod tests;
