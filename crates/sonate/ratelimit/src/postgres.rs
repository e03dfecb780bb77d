//! Shared Postgres counter store. The increment is a single upsert-returning
//! statement, the database's native atomic increment-with-expiry.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::counter::CounterStore;
use crate::error::RateLimitError;

/// Create the backing table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RateLimitError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sonate_rate_windows (
            key TEXT NOT NULL,
            window_start_ms BIGINT NOT NULL,
            count BIGINT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (key, window_start_ms)
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and prepare the schema.
    pub async fn connect(url: &str) -> Result<Self, RateLimitError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CounterStore for PostgresCounterStore {
    async fn increment(
        &self,
        key: &str,
        window_start_ms: i64,
        window_ms: i64,
    ) -> Result<u64, RateLimitError> {
        let expires_at = Utc
            .timestamp_millis_opt(window_start_ms + window_ms)
            .single()
            .unwrap_or_else(|| Utc::now() + Duration::milliseconds(window_ms));

        let row = sqlx::query(
            "INSERT INTO sonate_rate_windows (key, window_start_ms, count, expires_at)
             VALUES ($1, $2, 1, $3)
             ON CONFLICT (key, window_start_ms)
             DO UPDATE SET count = sonate_rate_windows.count + 1
             RETURNING count",
        )
        .bind(key)
        .bind(window_start_ms)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count as u64)
    }

    async fn reset_prefix(&self, prefix: &str) -> Result<u64, RateLimitError> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let result = sqlx::query("DELETE FROM sonate_rate_windows WHERE key LIKE $1")
            .bind(pattern)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<u64, RateLimitError> {
        let now = Utc
            .timestamp_millis_opt(now_ms)
            .single()
            .unwrap_or_else(Utc::now);
        let result = sqlx::query("DELETE FROM sonate_rate_windows WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> PostgresCounterStore {
        let url = std::env::var("SONATE_TEST_POSTGRES_URL")
            .unwrap_or_else(|_| "postgres://localhost/sonate_test".to_string());
        PostgresCounterStore::connect(&url)
            .await
            .expect("test database reachable")
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres instance"]
    async fn postgres_increment_is_monotonic() {
        let store = store().await;
        let key = format!("it:{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let first = store.increment(&key, 0, 60_000).await.unwrap();
        let second = store.increment(&key, 0, 60_000).await.unwrap();
        assert_eq!(second, first + 1);
    }
}
