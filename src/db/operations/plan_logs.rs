use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert_plan_log(
    pool: &PgPool,
    user_id: &str,
    plan_json: &serde_json::Value,
    duration_minutes: i64,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO "study_plan_logs" ("id","userId","planJson","durationMinutes","completed")
        VALUES ($1,$2,$3,$4,0)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(plan_json)
    .bind(duration_minutes)
    .execute(pool)
    .await?;

    Ok(id)
}
