mod auth;
mod content;
mod health;
mod mastery;
mod quiz;
mod recommender;
mod users;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::db::Database;
use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/users", users::router())
        .nest("/api/v1/content", content::router())
        .nest("/api/v1/quiz", quiz::router())
        .nest("/api/v1/mastery", mastery::router())
        .nest("/api/v1/recommender", recommender::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found").into_response()
}

/// Handlers that touch storage all funnel through this; a missing database
/// is a 503, not a panic.
pub(crate) fn require_db(state: &AppState) -> Result<Arc<Database>, crate::response::AppError> {
    state
        .db()
        .ok_or_else(|| crate::response::AppError::service_unavailable("Database unavailable"))
}
