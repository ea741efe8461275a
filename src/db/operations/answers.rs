use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    pub chosen_option: String,
    pub correct: bool,
    pub response_time_sec: Option<f64>,
    pub created_at: NaiveDateTime,
}

pub async fn insert_answer(
    pool: &PgPool,
    user_id: &str,
    question_id: &str,
    chosen_option: &str,
    correct: bool,
    response_time_sec: Option<f64>,
) -> Result<AnswerRecord, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "quiz_answers"
          ("id","userId","questionId","chosenOption","correct","responseTimeSec","createdAt")
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(question_id)
    .bind(chosen_option)
    .bind(correct)
    .bind(response_time_sec)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(AnswerRecord {
        id,
        user_id: user_id.to_string(),
        question_id: question_id.to_string(),
        chosen_option: chosen_option.to_string(),
        correct,
        response_time_sec,
        created_at: now,
    })
}

/// Answers a user has given on questions belonging to one topic, newest
/// first. Feeds the accuracy figures on the mastery detail view.
pub async fn fetch_recent_answers(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
    limit: i64,
) -> Result<Vec<AnswerRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT a."id",a."userId",a."questionId",a."chosenOption",a."correct",a."responseTimeSec",a."createdAt"
        FROM "quiz_answers" a
        JOIN "quiz_questions" q ON q."id" = a."questionId"
        WHERE a."userId" = $1 AND q."topicId" = $2
        ORDER BY a."createdAt" DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(topic_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(map_answer_row).collect())
}

fn map_answer_row(row: &sqlx::postgres::PgRow) -> AnswerRecord {
    AnswerRecord {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        question_id: row.try_get("questionId").unwrap_or_default(),
        chosen_option: row.try_get("chosenOption").unwrap_or_default(),
        correct: row.try_get("correct").unwrap_or(false),
        response_time_sec: row.try_get("responseTimeSec").ok(),
        created_at: row
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }
}
