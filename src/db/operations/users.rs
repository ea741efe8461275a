use chrono::{NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub phone_number: String,
    pub name: String,
    pub study_level: String,
    pub target_specialty: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub study_level: Option<String>,
    pub target_specialty: Option<String>,
}

pub async fn insert_user(
    pool: &PgPool,
    phone_number: &str,
    name: &str,
) -> Result<UserRecord, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "users" ("id","phoneNumber","name","studyLevel","createdAt","updatedAt")
        VALUES ($1,$2,$3,'intern',$4,$4)
        "#,
    )
    .bind(&id)
    .bind(phone_number)
    .bind(name)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(UserRecord {
        id,
        phone_number: phone_number.to_string(),
        name: name.to_string(),
        study_level: "intern".to_string(),
        target_specialty: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_user(pool: &PgPool, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","phoneNumber","name","studyLevel","targetSpecialty","createdAt","updatedAt"
        FROM "users"
        WHERE "id" = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_user_row(&r)))
}

pub async fn get_user_by_phone(
    pool: &PgPool,
    phone_number: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id","phoneNumber","name","studyLevel","targetSpecialty","createdAt","updatedAt"
        FROM "users"
        WHERE "phoneNumber" = $1
        "#,
    )
    .bind(phone_number)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_user_row(&r)))
}

pub async fn update_user(
    pool: &PgPool,
    user_id: &str,
    update: &UserUpdate,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE "users" SET
          "name" = COALESCE($2, "name"),
          "studyLevel" = COALESCE($3, "studyLevel"),
          "targetSpecialty" = COALESCE($4, "targetSpecialty"),
          "updatedAt" = NOW()
        WHERE "id" = $1
        RETURNING "id","phoneNumber","name","studyLevel","targetSpecialty","createdAt","updatedAt"
        "#,
    )
    .bind(user_id)
    .bind(update.name.as_deref())
    .bind(update.study_level.as_deref())
    .bind(update.target_specialty.as_deref())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_user_row(&r)))
}

pub async fn delete_user(pool: &PgPool, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "users" WHERE "id" = $1"#)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Default)]
pub struct UserActivityStats {
    pub topics_studied: i64,
    pub total_answers: i64,
    pub correct_answers: i64,
    pub average_mastery: f64,
}

pub async fn get_user_activity_stats(
    pool: &PgPool,
    user_id: &str,
) -> Result<UserActivityStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
          (SELECT COUNT(*) FROM "masteries" m WHERE m."userId" = $1) as "topics",
          (SELECT COUNT(*) FROM "quiz_answers" a WHERE a."userId" = $1) as "answers",
          (SELECT COUNT(*) FROM "quiz_answers" a WHERE a."userId" = $1 AND a."correct") as "correct",
          (SELECT COALESCE(AVG(m."score"), 0.0) FROM "masteries" m WHERE m."userId" = $1) as "avgScore"
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(UserActivityStats {
        topics_studied: row.try_get::<i64, _>("topics").unwrap_or(0),
        total_answers: row.try_get::<i64, _>("answers").unwrap_or(0),
        correct_answers: row.try_get::<i64, _>("correct").unwrap_or(0),
        average_mastery: row.try_get::<f64, _>("avgScore").unwrap_or(0.0),
    })
}

fn map_user_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.try_get("id").unwrap_or_default(),
        phone_number: row.try_get("phoneNumber").unwrap_or_default(),
        name: row.try_get("name").unwrap_or_default(),
        study_level: row
            .try_get("studyLevel")
            .unwrap_or_else(|_| "intern".to_string()),
        target_specialty: row.try_get("targetSpecialty").ok(),
        created_at: row
            .try_get("createdAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        updated_at: row
            .try_get("updatedAt")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    }
}
