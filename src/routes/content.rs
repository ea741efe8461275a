use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::operations::topics::TopicRecord;
use crate::response::{AppError, SuccessResponse};
use crate::routes::require_db;
use crate::services::content::{self, ContentError, CreateTopicInput, IngestTextInput};
use crate::services::splitter::TextSplitter;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", post(create_topic).get(list_topics))
        .route("/topics/:topicId", get(get_topic))
        .route("/topics/:topicId/summary", get(topic_summary))
        .route("/ingest", post(ingest))
        .route("/ingestion-status/:jobId", get(ingestion_status))
        .route("/search", post(search))
}

fn map_content_err(err: ContentError) -> AppError {
    match err {
        ContentError::UserNotFound => AppError::not_found("User not found"),
        ContentError::TopicNotFound => AppError::not_found("Topic not found"),
        ContentError::ParentNotFound => AppError::not_found("Parent topic not found"),
        ContentError::JobNotFound => AppError::not_found("Ingestion job not found"),
        ContentError::Validation(message) => AppError::validation(message),
        ContentError::Sql(err) => AppError::internal(err.to_string()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicDto {
    id: String,
    parent_id: Option<String>,
    name: String,
    system_name: Option<String>,
    source_reference: Option<String>,
    description: Option<String>,
    created_at: String,
}

impl TopicDto {
    fn from_record(record: TopicRecord) -> Self {
        Self {
            id: record.id,
            parent_id: record.parent_id,
            name: record.name,
            system_name: record.system_name,
            source_reference: record.source_reference,
            description: record.description,
            created_at: format_naive_iso(record.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTopicRequest {
    name: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    system_name: Option<String>,
    #[serde(default)]
    source_reference: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn create_topic(
    State(state): State<AppState>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let record = content::create_topic(
        db.pool(),
        CreateTopicInput {
            parent_id: payload.parent_id,
            name: payload.name,
            system_name: payload.system_name,
            source_reference: payload.source_reference,
            description: payload.description,
        },
    )
    .await
    .map_err(map_content_err)?;

    Ok(Json(SuccessResponse::new(TopicDto::from_record(record))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTopicsQuery {
    #[serde(default)]
    system_name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<ListTopicsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let records = content::list_topics(
        db.pool(),
        query.system_name.as_deref(),
        query.parent_id.as_deref(),
    )
    .await
    .map_err(map_content_err)?;

    let dtos: Vec<TopicDto> = records.into_iter().map(TopicDto::from_record).collect();
    Ok(Json(SuccessResponse::new(dtos)))
}

async fn get_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let record = content::get_topic(db.pool(), &topic_id)
        .await
        .map_err(map_content_err)?;

    Ok(Json(SuccessResponse::new(TopicDto::from_record(record))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryQuery {
    #[serde(default = "default_true")]
    include_high_yield: bool,
}

fn default_true() -> bool {
    true
}

async fn topic_summary(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let summary = content::get_topic_summary(
        db.pool(),
        state.llm().as_ref(),
        &topic_id,
        query.include_high_yield,
    )
    .await
    .map_err(map_content_err)?;

    Ok(Json(SuccessResponse::new(summary)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    user_id: String,
    topic_id: String,
    text: String,
    #[serde(default)]
    source_filename: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestAccepted {
    job_id: String,
    status: &'static str,
}

async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let config = state.config();
    let splitter = TextSplitter::new(
        config.chunk_size_min,
        config.chunk_size_max,
        config.chunk_overlap,
    );

    let job_id = content::ingest_text(
        db.pool(),
        splitter,
        IngestTextInput {
            user_id: payload.user_id,
            topic_id: payload.topic_id,
            text: payload.text,
            source_filename: payload.source_filename,
        },
    )
    .await
    .map_err(map_content_err)?;

    Ok(Json(SuccessResponse::new(IngestAccepted {
        job_id,
        status: "queued",
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobDto {
    job_id: String,
    topic_id: String,
    status: String,
    source_filename: Option<String>,
    chunk_count: Option<i32>,
    error_message: Option<String>,
    created_at: String,
    finished_at: Option<String>,
}

async fn ingestion_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let job = content::get_ingestion_job(db.pool(), &job_id)
        .await
        .map_err(map_content_err)?;

    Ok(Json(SuccessResponse::new(IngestionJobDto {
        job_id: job.id,
        topic_id: job.topic_id,
        status: job.status.as_str().to_string(),
        source_filename: job.source_filename,
        chunk_count: job.chunk_count,
        error_message: job.error_message,
        created_at: format_naive_iso(job.created_at),
        finished_at: job.finished_at.map(format_naive_iso),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    #[serde(default)]
    topic_id: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = require_db(&state)?;

    let results = content::search_content(db.pool(), &payload.query, payload.topic_id.as_deref())
        .await
        .map_err(map_content_err)?;

    Ok(Json(SuccessResponse::new(results)))
}

fn format_naive_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
