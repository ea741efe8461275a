use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "done" => Self::Done,
            "error" => Self::Error,
            _ => Self::Queued,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionJobRecord {
    pub id: String,
    pub user_id: String,
    pub topic_id: String,
    pub status: IngestionStatus,
    pub source_filename: Option<String>,
    pub chunk_count: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

pub async fn create_job(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
    source_filename: Option<&str>,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO "ingestion_jobs" ("id","userId","topicId","status","sourceFilename")
        VALUES ($1,$2,$3,'queued',$4)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(topic_id)
    .bind(source_filename)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn mark_running(pool: &PgPool, job_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "ingestion_jobs" SET "status" = 'running' WHERE "id" = $1"#)
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_done(pool: &PgPool, job_id: &str, chunk_count: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "ingestion_jobs"
        SET "status" = 'done', "chunkCount" = $2, "finishedAt" = NOW()
        WHERE "id" = $1
        "#,
    )
    .bind(job_id)
    .bind(chunk_count)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_error(pool: &PgPool, job_id: &str, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "ingestion_jobs"
        SET "status" = 'error', "errorMessage" = $2, "finishedAt" = NOW()
        WHERE "id" = $1
        "#,
    )
    .bind(job_id)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_job(
    pool: &PgPool,
    job_id: &str,
) -> Result<Option<IngestionJobRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","userId","topicId","status","sourceFilename","chunkCount","errorMessage","createdAt","finishedAt"
        FROM "ingestion_jobs"
        WHERE "id" = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| IngestionJobRecord {
        id: r.try_get("id").unwrap_or_default(),
        user_id: r.try_get("userId").unwrap_or_default(),
        topic_id: r.try_get("topicId").unwrap_or_default(),
        status: IngestionStatus::from_str(
            &r.try_get::<String, _>("status").unwrap_or_default(),
        ),
        source_filename: r.try_get("sourceFilename").ok(),
        chunk_count: r.try_get("chunkCount").ok(),
        error_message: r.try_get("errorMessage").ok(),
        created_at: r
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        finished_at: r.try_get("finishedAt").ok(),
    }))
}
