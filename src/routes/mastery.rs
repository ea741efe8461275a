use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::response::{AppError, SuccessResponse};
use crate::routes::require_db;
use crate::services::mastery::{self, MasteryError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:userId", get(dashboard))
        .route("/:userId/topic/:topicId", get(topic_detail))
}

fn map_mastery_err(err: MasteryError) -> AppError {
    match err {
        MasteryError::UserNotFound => AppError::not_found("User not found"),
        MasteryError::TopicNotFound => AppError::not_found("Topic not found"),
        MasteryError::Sql(err) => AppError::internal(err.to_string()),
    }
}

async fn dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;
    let params = state.mastery_params();

    let dashboard = mastery::get_user_mastery_dashboard(db.pool(), &user_id, &params)
        .await
        .map_err(map_mastery_err)?;

    Ok(Json(SuccessResponse::new(dashboard)))
}

async fn topic_detail(
    State(state): State<AppState>,
    Path((user_id, topic_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;
    let params = state.mastery_params();

    let detail = mastery::get_topic_mastery_detail(db.pool(), &user_id, &topic_id, &params)
        .await
        .map_err(map_mastery_err)?;

    Ok(Json(SuccessResponse::new(detail)))
}
