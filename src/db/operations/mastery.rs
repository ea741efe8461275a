use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// One proficiency record per (user, topic) pair, enforced by a unique
/// constraint. Only the mastery update rule mutates it.
#[derive(Debug, Clone)]
pub struct MasteryRecord {
    pub id: String,
    pub user_id: String,
    pub topic_id: String,
    pub score: f64,
    pub last_reviewed_at: Option<NaiveDateTime>,
    pub review_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub async fn get_mastery(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
) -> Result<Option<MasteryRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","userId","topicId","score","lastReviewedAt","reviewCount","createdAt","updatedAt"
        FROM "masteries"
        WHERE "userId" = $1 AND "topicId" = $2
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(topic_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_mastery_row(&r)))
}

/// Lazily creates the record with the configured initial score. The
/// ON CONFLICT no-op keeps concurrent first accesses from racing.
pub async fn get_or_create_mastery(
    pool: &PgPool,
    user_id: &str,
    topic_id: &str,
    initial_score: f64,
) -> Result<MasteryRecord, sqlx::Error> {
    if let Some(existing) = get_mastery(pool, user_id, topic_id).await? {
        return Ok(existing);
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "masteries" ("id","userId","topicId","score","reviewCount","createdAt","updatedAt")
        VALUES ($1,$2,$3,$4,0,$5,$5)
        ON CONFLICT ("userId","topicId") DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(topic_id)
    .bind(initial_score)
    .bind(now)
    .execute(pool)
    .await?;

    // re-read in case a concurrent insert won the conflict
    match get_mastery(pool, user_id, topic_id).await? {
        Some(record) => Ok(record),
        None => Err(sqlx::Error::RowNotFound),
    }
}

/// Idempotent upsert of the whole record. The conflict target doubles as
/// the per-(user,topic) serialization point for concurrent quiz answers.
pub async fn persist(pool: &PgPool, record: &MasteryRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "masteries"
          ("id","userId","topicId","score","lastReviewedAt","reviewCount","createdAt","updatedAt")
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        ON CONFLICT ("userId","topicId") DO UPDATE SET
          "score" = EXCLUDED."score",
          "lastReviewedAt" = EXCLUDED."lastReviewedAt",
          "reviewCount" = EXCLUDED."reviewCount",
          "updatedAt" = EXCLUDED."updatedAt"
        "#,
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(&record.topic_id)
    .bind(record.score)
    .bind(record.last_reviewed_at)
    .bind(record.review_count)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<MasteryRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id","userId","topicId","score","lastReviewedAt","reviewCount","createdAt","updatedAt"
        FROM "masteries"
        WHERE "userId" = $1
        ORDER BY "topicId" ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(map_mastery_row).collect())
}

fn map_mastery_row(row: &sqlx::postgres::PgRow) -> MasteryRecord {
    MasteryRecord {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        topic_id: row.try_get("topicId").unwrap_or_default(),
        score: row.try_get("score").unwrap_or(0.0),
        last_reviewed_at: row.try_get("lastReviewedAt").ok(),
        review_count: row.try_get("reviewCount").unwrap_or(0),
        created_at: row
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        updated_at: row
            .try_get("updatedAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }
}
