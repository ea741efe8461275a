use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::operations::users::{self, UserRecord, UserUpdate};
use crate::response::{AppError, SuccessResponse};
use crate::routes::require_db;
use crate::state::AppState;

const STUDY_LEVELS: [&str; 4] = ["intern", "resident", "fellow", "practicing"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:userId", get(get_user).put(update_user).delete(delete_user))
        .route("/:userId/profile", get(get_profile))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: String,
    phone_number: String,
    name: String,
    study_level: String,
    target_specialty: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserDto {
    fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            phone_number: record.phone_number,
            name: record.name,
            study_level: record.study_level,
            target_specialty: record.target_specialty,
            created_at: format_naive_iso(record.created_at),
            updated_at: format_naive_iso(record.updated_at),
        }
    }
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let user = users::get_user(db.pool(), &user_id)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(SuccessResponse::new(UserDto::from_record(user))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    study_level: Option<String>,
    #[serde(default)]
    target_specialty: Option<String>,
}

async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    if let Some(level) = payload.study_level.as_deref() {
        if !STUDY_LEVELS.contains(&level) {
            return Err(AppError::validation(format!(
                "studyLevel must be one of: {}",
                STUDY_LEVELS.join(", ")
            )));
        }
    }

    let update = UserUpdate {
        name: payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        study_level: payload.study_level,
        target_specialty: payload.target_specialty,
    };

    let user = users::update_user(db.pool(), &user_id, &update)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(SuccessResponse::new(UserDto::from_record(user))))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let deleted = users::delete_user(db.pool(), &user_id)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?;

    if !deleted {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(user_id = user_id.as_str(), "user deleted");
    Ok(Json(SuccessResponse::new(serde_json::json!({ "deleted": true }))))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserProfileDto {
    #[serde(flatten)]
    user: UserDto,
    topics_studied: i64,
    total_answers: i64,
    correct_answers: i64,
    overall_accuracy: f64,
    average_mastery: f64,
}

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let user = users::get_user(db.pool(), &user_id)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let stats = users::get_user_activity_stats(db.pool(), &user_id)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?;

    let overall_accuracy = if stats.total_answers > 0 {
        stats.correct_answers as f64 / stats.total_answers as f64
    } else {
        0.0
    };

    Ok(Json(SuccessResponse::new(UserProfileDto {
        user: UserDto::from_record(user),
        topics_studied: stats.topics_studied,
        total_answers: stats.total_answers,
        correct_answers: stats.correct_answers,
        overall_accuracy: (overall_accuracy * 1000.0).round() / 1000.0,
        average_mastery: (stats.average_mastery * 1000.0).round() / 1000.0,
    })))
}

fn format_naive_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
