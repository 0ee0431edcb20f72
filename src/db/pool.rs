use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

/// Builds the Postgres pool the whole service shares.
pub async fn create_pool() -> Result<PgPool, sqlx::Error> {
    let config = Config::get();
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
}
