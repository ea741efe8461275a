use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::response::{AppError, SuccessResponse};
use crate::routes::require_db;
use crate::services::recommender::{self, PlanRequest, RecommendError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:userId/plan", get(get_plan).post(post_plan))
}

fn map_recommend_err(err: RecommendError) -> AppError {
    match err {
        RecommendError::UserNotFound => AppError::not_found("User not found"),
        RecommendError::Sql(err) => AppError::internal(err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanQuery {
    #[serde(default)]
    duration_minutes: Option<i64>,
    /// comma-separated topic ids
    #[serde(default)]
    focus_topics: Option<String>,
    #[serde(default)]
    include_quiz: Option<bool>,
}

async fn get_plan(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PlanQuery>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let focus_topic_ids = query.focus_topics.as_deref().map(|raw| {
        raw.split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect::<Vec<_>>()
    });

    let request = PlanRequest {
        duration_minutes: query
            .duration_minutes
            .unwrap_or(state.config().default_plan_minutes),
        focus_topic_ids,
        include_quiz: query.include_quiz.unwrap_or(true),
    };

    let plan = recommender::generate_study_plan(
        db.pool(),
        state.llm().as_ref(),
        &user_id,
        request,
        &state.mastery_params(),
    )
    .await
    .map_err(map_recommend_err)?;

    Ok(Json(SuccessResponse::new(plan)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanBody {
    #[serde(default)]
    duration_minutes: Option<i64>,
    #[serde(default)]
    focus_topics: Option<Vec<String>>,
    #[serde(default)]
    include_quiz: Option<bool>,
}

async fn post_plan(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<PlanBody>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let request = PlanRequest {
        duration_minutes: payload
            .duration_minutes
            .unwrap_or(state.config().default_plan_minutes),
        focus_topic_ids: payload.focus_topics,
        include_quiz: payload.include_quiz.unwrap_or(true),
    };

    let plan = recommender::generate_study_plan(
        db.pool(),
        state.llm().as_ref(),
        &user_id,
        request,
        &state.mastery_params(),
    )
    .await
    .map_err(map_recommend_err)?;

    Ok(Json(SuccessResponse::new(plan)))
}
