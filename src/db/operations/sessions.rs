use chrono::NaiveDateTime;
use sqlx::PgPool;

pub async fn insert_session(
    pool: &PgPool,
    token_hash: &str,
    user_id: &str,
    expires_at: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "sessions" ("token","userId","expiresAt")
        VALUES ($1,$2,$3)
        ON CONFLICT ("token") DO UPDATE SET "expiresAt" = EXCLUDED."expiresAt"
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn purge_expired_sessions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "sessions" WHERE "expiresAt" < NOW()"#)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
