use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::errors::AppError;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database migrations complete");
    Ok(())
}

/// Connect and migrate using the configured database.
pub async fn connect(config: &AppConfig) -> Result<PgPool, AppError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Validation("DATABASE_URL is not set".to_string()))?;
    let pool = init_pool(url, config.max_connections).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
