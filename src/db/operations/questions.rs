use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: String,
    pub topic_id: String,
    pub stem: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub explanation: Option<String>,
    pub difficulty: String,
    pub source_chunk_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub topic_id: String,
    pub stem: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub explanation: Option<String>,
    pub difficulty: String,
    pub source_chunk_id: Option<String>,
}

pub async fn insert_question(
    pool: &PgPool,
    question: &NewQuestion,
) -> Result<QuestionRecord, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "quiz_questions"
          ("id","topicId","stem","optionA","optionB","optionC","optionD",
           "correctOption","explanation","difficulty","sourceChunkId","createdAt")
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
        "#,
    )
    .bind(&id)
    .bind(&question.topic_id)
    .bind(&question.stem)
    .bind(&question.option_a)
    .bind(&question.option_b)
    .bind(&question.option_c)
    .bind(&question.option_d)
    .bind(&question.correct_option)
    .bind(question.explanation.as_deref())
    .bind(&question.difficulty)
    .bind(question.source_chunk_id.as_deref())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(QuestionRecord {
        id,
        topic_id: question.topic_id.clone(),
        stem: question.stem.clone(),
        option_a: question.option_a.clone(),
        option_b: question.option_b.clone(),
        option_c: question.option_c.clone(),
        option_d: question.option_d.clone(),
        correct_option: question.correct_option.clone(),
        explanation: question.explanation.clone(),
        difficulty: question.difficulty.clone(),
        source_chunk_id: question.source_chunk_id.clone(),
        created_at: now,
    })
}

pub async fn get_question(
    pool: &PgPool,
    question_id: &str,
) -> Result<Option<QuestionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","topicId","stem","optionA","optionB","optionC","optionD",
               "correctOption","explanation","difficulty","sourceChunkId","createdAt"
        FROM "quiz_questions"
        WHERE "id" = $1
        "#,
    )
    .bind(question_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_question_row(&r)))
}

pub async fn list_for_topic(
    pool: &PgPool,
    topic_id: &str,
    difficulty: Option<&str>,
) -> Result<Vec<QuestionRecord>, sqlx::Error> {
    let rows = if let Some(level) = difficulty {
        sqlx::query(
            r#"
            SELECT "id","topicId","stem","optionA","optionB","optionC","optionD",
                   "correctOption","explanation","difficulty","sourceChunkId","createdAt"
            FROM "quiz_questions"
            WHERE "topicId" = $1 AND "difficulty" = $2
            ORDER BY "createdAt" ASC
            "#,
        )
        .bind(topic_id)
        .bind(level)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query(
            r#"
            SELECT "id","topicId","stem","optionA","optionB","optionC","optionD",
                   "correctOption","explanation","difficulty","sourceChunkId","createdAt"
            FROM "quiz_questions"
            WHERE "topicId" = $1
            ORDER BY "createdAt" ASC
            "#,
        )
        .bind(topic_id)
        .fetch_all(pool)
        .await?
    };

    Ok(rows.iter().map(map_question_row).collect())
}

fn map_question_row(row: &sqlx::postgres::PgRow) -> QuestionRecord {
    QuestionRecord {
        id: row.try_get("id").unwrap_or_default(),
        topic_id: row.try_get("topicId").unwrap_or_default(),
        stem: row.try_get("stem").unwrap_or_default(),
        option_a: row.try_get("optionA").unwrap_or_default(),
        option_b: row.try_get("optionB").unwrap_or_default(),
        option_c: row.try_get("optionC").unwrap_or_default(),
        option_d: row.try_get("optionD").unwrap_or_default(),
        correct_option: row.try_get("correctOption").unwrap_or_default(),
        explanation: row.try_get("explanation").ok(),
        difficulty: row
            .try_get("difficulty")
            .unwrap_or_else(|_| "medium".to_string()),
        source_chunk_id: row.try_get("sourceChunkId").ok(),
        created_at: row
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }
}
