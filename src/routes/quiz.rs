use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::response::{AppError, SuccessResponse};
use crate::routes::require_db;
use crate::services::quiz::{self, CreateQuestionInput, QuizError};
use crate::state::AppState;

const MAX_QUIZ_SIZE: i64 = 50;
const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", get(generate))
        .route("/answer", post(answer))
        .route("/questions", post(create_question))
        .route("/questions/:questionId", get(question_detail))
}

fn map_quiz_err(err: QuizError) -> AppError {
    match err {
        QuizError::UserNotFound => AppError::not_found("User not found"),
        QuizError::TopicNotFound => AppError::not_found("Topic not found"),
        QuizError::QuestionNotFound => AppError::not_found("Question not found"),
        QuizError::NoContent => {
            AppError::bad_request("No content available for this topic to generate questions")
        }
        QuizError::Validation(message) => AppError::validation(message),
        QuizError::Sql(err) => AppError::internal(err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateQuery {
    topic_id: String,
    #[serde(default)]
    count: Option<i64>,
    #[serde(default)]
    difficulty: Option<String>,
}

async fn generate(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    if let Some(level) = query.difficulty.as_deref() {
        if !DIFFICULTIES.contains(&level) {
            return Err(AppError::validation(format!(
                "difficulty must be one of: {}",
                DIFFICULTIES.join(", ")
            )));
        }
    }

    let count = query
        .count
        .unwrap_or(state.config().default_quiz_size)
        .clamp(1, MAX_QUIZ_SIZE) as usize;

    let records = quiz::generate_or_fetch_questions(
        db.pool(),
        state.llm().as_ref(),
        &query.topic_id,
        count,
        query.difficulty.as_deref(),
    )
    .await
    .map_err(map_quiz_err)?;

    let questions: Vec<_> = records.iter().map(quiz::format_question).collect();
    Ok(Json(SuccessResponse::new(questions)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    user_id: String,
    question_id: String,
    chosen_option: String,
    #[serde(default)]
    response_time_sec: Option<f64>,
}

async fn answer(
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;
    let params = state.mastery_params();

    let result = quiz::submit_answer(
        db.pool(),
        &payload.user_id,
        &payload.question_id,
        &payload.chosen_option,
        payload.response_time_sec,
        &params,
    )
    .await
    .map_err(map_quiz_err)?;

    Ok(Json(SuccessResponse::new(result)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuestionRequest {
    topic_id: String,
    stem: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_option: String,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDetailDto {
    id: String,
    topic_id: String,
    stem: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_option: String,
    explanation: Option<String>,
    difficulty: String,
}

async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    if let Some(level) = payload.difficulty.as_deref() {
        if !DIFFICULTIES.contains(&level) {
            return Err(AppError::validation(format!(
                "difficulty must be one of: {}",
                DIFFICULTIES.join(", ")
            )));
        }
    }

    let record = quiz::create_question(
        db.pool(),
        CreateQuestionInput {
            topic_id: payload.topic_id,
            stem: payload.stem,
            option_a: payload.option_a,
            option_b: payload.option_b,
            option_c: payload.option_c,
            option_d: payload.option_d,
            correct_option: payload.correct_option,
            explanation: payload.explanation,
            difficulty: payload.difficulty,
        },
    )
    .await
    .map_err(map_quiz_err)?;

    Ok(Json(SuccessResponse::new(QuestionDetailDto {
        id: record.id,
        topic_id: record.topic_id,
        stem: record.stem,
        option_a: record.option_a,
        option_b: record.option_b,
        option_c: record.option_c,
        option_d: record.option_d,
        correct_option: record.correct_option,
        explanation: record.explanation,
        difficulty: record.difficulty,
    })))
}

async fn question_detail(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let record = quiz::get_question_detail(db.pool(), &question_id)
        .await
        .map_err(map_quiz_err)?;

    Ok(Json(SuccessResponse::new(QuestionDetailDto {
        id: record.id,
        topic_id: record.topic_id,
        stem: record.stem,
        option_a: record.option_a,
        option_b: record.option_b,
        option_c: record.option_c,
        option_d: record.option_d,
        correct_option: record.correct_option,
        explanation: record.explanation,
        difficulty: record.difficulty,
    })))
}
