use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::operations::chunks::{self, NewChunk};
use crate::db::operations::ingestion::{self, IngestionJobRecord};
use crate::db::operations::topics::{self, NewTopic, TopicRecord};
use crate::db::operations::users;
use crate::services::llm_provider::{HighYieldTrap, LLMProvider};
use crate::services::splitter::TextSplitter;

const SUMMARY_CHUNK_LIMIT: i64 = 10;
const SEARCH_RESULT_LIMIT: i64 = 20;
const PLACEHOLDER_EXCERPT_CHARS: usize = 600;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("user not found")]
    UserNotFound,
    #[error("topic not found")]
    TopicNotFound,
    #[error("parent topic not found")]
    ParentNotFound,
    #[error("ingestion job not found")]
    JobNotFound,
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct CreateTopicInput {
    pub parent_id: Option<String>,
    pub name: String,
    pub system_name: Option<String>,
    pub source_reference: Option<String>,
    pub description: Option<String>,
}

pub async fn create_topic(
    pool: &PgPool,
    input: CreateTopicInput,
) -> Result<TopicRecord, ContentError> {
    if input.name.trim().is_empty() {
        return Err(ContentError::Validation("topic name is required".to_string()));
    }

    if let Some(parent_id) = input.parent_id.as_deref() {
        if topics::get_topic(pool, parent_id).await?.is_none() {
            return Err(ContentError::ParentNotFound);
        }
    }

    let record = topics::insert_topic(
        pool,
        &NewTopic {
            parent_id: input.parent_id,
            name: input.name.trim().to_string(),
            system_name: input.system_name,
            source_reference: input.source_reference,
            description: input.description,
        },
    )
    .await?;

    tracing::info!(topic_id = record.id.as_str(), name = record.name.as_str(), "topic created");
    Ok(record)
}

pub async fn list_topics(
    pool: &PgPool,
    system_name: Option<&str>,
    parent_id: Option<&str>,
) -> Result<Vec<TopicRecord>, ContentError> {
    Ok(topics::list_topics(pool, system_name, parent_id).await?)
}

pub async fn get_topic(pool: &PgPool, topic_id: &str) -> Result<TopicRecord, ContentError> {
    topics::get_topic(pool, topic_id)
        .await?
        .ok_or(ContentError::TopicNotFound)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic_id: String,
    pub topic_name: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub high_yield_traps: Vec<HighYieldTrap>,
    pub source_chunk_count: usize,
    pub generated: bool,
}

/// Topic summary for review material. When the LLM is unconfigured or
/// fails, the caller still gets a usable placeholder built from the raw
/// chunks; enrichment never turns into an error.
pub async fn get_topic_summary(
    pool: &PgPool,
    llm: &LLMProvider,
    topic_id: &str,
    include_high_yield: bool,
) -> Result<TopicSummary, ContentError> {
    let topic = get_topic(pool, topic_id).await?;
    let chunk_rows = chunks::list_for_topic(pool, topic_id, SUMMARY_CHUNK_LIMIT).await?;
    let total_chunks = chunks::count_for_topic(pool, topic_id).await? as usize;

    if chunk_rows.is_empty() {
        return Ok(TopicSummary {
            topic_id: topic.id,
            topic_name: topic.name.clone(),
            summary: format!("No content has been ingested for {} yet.", topic.name),
            key_points: Vec::new(),
            high_yield_traps: Vec::new(),
            source_chunk_count: 0,
            generated: false,
        });
    }

    let combined = chunk_rows
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    if llm.is_available() {
        match llm
            .generate_summary(&topic.name, &combined, include_high_yield)
            .await
        {
            Ok(generated) => {
                return Ok(TopicSummary {
                    topic_id: topic.id,
                    topic_name: topic.name,
                    summary: generated.summary,
                    key_points: generated.key_points,
                    high_yield_traps: if include_high_yield {
                        generated.high_yield_traps
                    } else {
                        Vec::new()
                    },
                    source_chunk_count: total_chunks,
                    generated: true,
                });
            }
            Err(err) => {
                tracing::warn!(topic_id, error = %err, "summary generation failed, using excerpt");
            }
        }
    }

    let excerpt: String = combined.chars().take(PLACEHOLDER_EXCERPT_CHARS).collect();
    Ok(TopicSummary {
        topic_id: topic.id,
        topic_name: topic.name,
        summary: excerpt,
        key_points: Vec::new(),
        high_yield_traps: Vec::new(),
        source_chunk_count: total_chunks,
        generated: false,
    })
}

#[derive(Debug, Clone)]
pub struct IngestTextInput {
    pub user_id: String,
    pub topic_id: String,
    pub text: String,
    pub source_filename: Option<String>,
}

/// Queue extracted document text for chunking. The split-and-store phase
/// runs on a spawned task; callers poll the job id for progress, mirroring
/// how long uploads behave.
pub async fn ingest_text(
    pool: &PgPool,
    splitter: TextSplitter,
    input: IngestTextInput,
) -> Result<String, ContentError> {
    if input.text.trim().is_empty() {
        return Err(ContentError::Validation("text must not be empty".to_string()));
    }
    if users::get_user(pool, &input.user_id).await?.is_none() {
        return Err(ContentError::UserNotFound);
    }
    if topics::get_topic(pool, &input.topic_id).await?.is_none() {
        return Err(ContentError::TopicNotFound);
    }

    let job_id = ingestion::create_job(
        pool,
        &input.user_id,
        &input.topic_id,
        input.source_filename.as_deref(),
    )
    .await?;

    let pool = pool.clone();
    let job = job_id.clone();
    tokio::spawn(async move {
        if let Err(err) = run_ingestion(&pool, &splitter, &job, input).await {
            tracing::error!(job_id = job.as_str(), error = %err, "ingestion failed");
            if let Err(mark_err) = ingestion::mark_error(&pool, &job, &err.to_string()).await {
                tracing::error!(job_id = job.as_str(), error = %mark_err, "could not record ingestion failure");
            }
        }
    });

    Ok(job_id)
}

async fn run_ingestion(
    pool: &PgPool,
    splitter: &TextSplitter,
    job_id: &str,
    input: IngestTextInput,
) -> Result<(), sqlx::Error> {
    ingestion::mark_running(pool, job_id).await?;

    let pieces = splitter.split(&input.text);
    let new_chunks: Vec<NewChunk> = pieces
        .into_iter()
        .map(|piece| NewChunk {
            topic_id: input.topic_id.clone(),
            chunk_index: piece.chunk_index as i32,
            word_count: piece.word_count as i32,
            text: piece.text,
            source_document: input.source_filename.clone(),
        })
        .collect();

    let ids = chunks::insert_chunks(pool, &new_chunks).await?;
    ingestion::mark_done(pool, job_id, ids.len() as i32).await?;

    tracing::info!(
        job_id,
        topic_id = input.topic_id.as_str(),
        chunks = ids.len(),
        "ingestion complete"
    );
    Ok(())
}

pub async fn get_ingestion_job(
    pool: &PgPool,
    job_id: &str,
) -> Result<IngestionJobRecord, ContentError> {
    ingestion::get_job(pool, job_id)
        .await?
        .ok_or(ContentError::JobNotFound)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSearchResult {
    pub chunk_id: String,
    pub topic_id: String,
    pub text: String,
    pub word_count: i32,
}

/// Keyword search over chunk text. Vector similarity is an external
/// collaborator; this stays a plain ILIKE match.
pub async fn search_content(
    pool: &PgPool,
    query: &str,
    topic_id: Option<&str>,
) -> Result<Vec<ChunkSearchResult>, ContentError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ContentError::Validation("query must not be empty".to_string()));
    }

    let rows = chunks::search_chunks(pool, trimmed, topic_id, SEARCH_RESULT_LIMIT).await?;
    Ok(rows
        .into_iter()
        .map(|chunk| ChunkSearchResult {
            chunk_id: chunk.id,
            topic_id: chunk.topic_id,
            text: chunk.text,
            word_count: chunk.word_count,
        })
        .collect())
}
