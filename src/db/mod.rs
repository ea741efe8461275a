pub mod migrate;
pub mod operations;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("DATABASE_URL is not set")]
    MissingUrl,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn from_env() -> Result<Arc<Self>, DbInitError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| DbInitError::MissingUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&url)
            .await?;

        migrate::run(&pool).await?;

        Ok(Arc::new(Self { pool }))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn delete_session_by_token_hash(&self, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query(r#"DELETE FROM "sessions" WHERE "token" = $1"#)
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
