use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub topic_id: String,
    pub chunk_index: i32,
    pub page_start: Option<i32>,
    pub page_end: Option<i32>,
    pub text: String,
    pub word_count: i32,
    pub source_document: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
    pub topic_id: String,
    pub chunk_index: i32,
    pub text: String,
    pub word_count: i32,
    pub source_document: Option<String>,
}

pub async fn insert_chunks(pool: &PgPool, chunks: &[NewChunk]) -> Result<Vec<String>, sqlx::Error> {
    let mut ids = Vec::with_capacity(chunks.len());
    let now = Utc::now().naive_utc();

    for chunk in chunks {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO "chunks" ("id","topicId","chunkIndex","text","wordCount","sourceDocument","createdAt")
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            "#,
        )
        .bind(&id)
        .bind(&chunk.topic_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.word_count)
        .bind(chunk.source_document.as_deref())
        .bind(now)
        .execute(pool)
        .await?;
        ids.push(id);
    }

    Ok(ids)
}

pub async fn list_for_topic(
    pool: &PgPool,
    topic_id: &str,
    limit: i64,
) -> Result<Vec<ChunkRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id","topicId","chunkIndex","pageStart","pageEnd","text","wordCount","sourceDocument","createdAt"
        FROM "chunks"
        WHERE "topicId" = $1
        ORDER BY "chunkIndex" ASC
        LIMIT $2
        "#,
    )
    .bind(topic_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(map_chunk_row).collect())
}

pub async fn count_for_topic(pool: &PgPool, topic_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "chunks" WHERE "topicId" = $1"#)
        .bind(topic_id)
        .fetch_one(pool)
        .await
}

/// Plain text match over chunk bodies. Vector similarity search is an
/// external concern; this is the keyword fallback the API exposes.
pub async fn search_chunks(
    pool: &PgPool,
    query: &str,
    topic_id: Option<&str>,
    limit: i64,
) -> Result<Vec<ChunkRecord>, sqlx::Error> {
    let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));

    let rows = if let Some(topic) = topic_id {
        sqlx::query(
            r#"
            SELECT "id","topicId","chunkIndex","pageStart","pageEnd","text","wordCount","sourceDocument","createdAt"
            FROM "chunks"
            WHERE "topicId" = $1 AND "text" ILIKE $2
            ORDER BY "chunkIndex" ASC
            LIMIT $3
            "#,
        )
        .bind(topic)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query(
            r#"
            SELECT "id","topicId","chunkIndex","pageStart","pageEnd","text","wordCount","sourceDocument","createdAt"
            FROM "chunks"
            WHERE "text" ILIKE $1
            ORDER BY "createdAt" DESC
            LIMIT $2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?
    };

    Ok(rows.iter().map(map_chunk_row).collect())
}

fn map_chunk_row(row: &sqlx::postgres::PgRow) -> ChunkRecord {
    ChunkRecord {
        id: row.try_get("id").unwrap_or_default(),
        topic_id: row.try_get("topicId").unwrap_or_default(),
        chunk_index: row.try_get("chunkIndex").unwrap_or(0),
        page_start: row.try_get("pageStart").ok(),
        page_end: row.try_get("pageEnd").ok(),
        text: row.try_get("text").unwrap_or_default(),
        word_count: row.try_get("wordCount").unwrap_or(0),
        source_document: row.try_get("sourceDocument").ok(),
        created_at: row
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }
}
