//! Shared Postgres backends. Atomicity comes from the database's own
//! insert-if-absent primitive (`ON CONFLICT DO NOTHING` checked through
//! `rows_affected`), never from read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::warn;

use crate::error::StoreError;
use crate::{NonceStore, RevocationRecord, RevocationStore};

/// Create the backing tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sonate_nonces (
            value TEXT PRIMARY KEY,
            claimed_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sonate_revocations (
            subject_id TEXT PRIMARY KEY,
            reason TEXT NOT NULL,
            revoked_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub struct PostgresNonceStore {
    pool: PgPool,
}

impl PostgresNonceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_insert(
        &self,
        nonce: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO sonate_nonces (value, claimed_at, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (value) DO NOTHING",
        )
        .bind(nonce)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl NonceStore for PostgresNonceStore {
    async fn mark_used(&self, nonce: &str, ttl_seconds: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_seconds);

        if self.try_insert(nonce, now, expires_at).await? {
            return Ok(());
        }

        // The slot is occupied. Reclaim it only if the claim has expired,
        // then retry the atomic insert once.
        sqlx::query("DELETE FROM sonate_nonces WHERE value = $1 AND expires_at <= $2")
            .bind(nonce)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if self.try_insert(nonce, now, expires_at).await? {
            Ok(())
        } else {
            warn!(nonce, "nonce replay rejected");
            Err(StoreError::NonceAlreadyUsed(nonce.to_string()))
        }
    }

    async fn is_used(&self, nonce: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM sonate_nonces WHERE value = $1 AND expires_at > $2")
            .bind(nonce)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sonate_nonces WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct PostgresRevocationStore {
    pool: PgPool,
}

impl PostgresRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PostgresRevocationStore {
    async fn revoke(
        &self,
        subject_id: &str,
        reason: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = ttl_seconds.map(|ttl| now + Duration::seconds(ttl));

        // Drop an expired record so the subject can be re-revoked; an active
        // record wins the conflict and the call stays idempotent.
        sqlx::query(
            "DELETE FROM sonate_revocations
             WHERE subject_id = $1 AND expires_at IS NOT NULL AND expires_at <= $2",
        )
        .bind(subject_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let result = sqlx::query(
            "INSERT INTO sonate_revocations (subject_id, reason, revoked_at, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (subject_id) DO NOTHING",
        )
        .bind(subject_id)
        .bind(reason)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            warn!(subject_id, reason, "subject revoked");
        }
        Ok(())
    }

    async fn is_revoked(&self, subject_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM sonate_revocations
             WHERE subject_id = $1 AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(subject_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn revocation(&self, subject_id: &str) -> Result<Option<RevocationRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT subject_id, reason, revoked_at, expires_at FROM sonate_revocations
             WHERE subject_id = $1 AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(subject_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| RevocationRecord {
            subject_id: row.get("subject_id"),
            reason: row.get("reason"),
            revoked_at: row.get("revoked_at"),
            expires_at: row.get("expires_at"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StoreBackend, SharedStores};

    async fn shared_stores() -> SharedStores {
        let url = std::env::var("SONATE_TEST_POSTGRES_URL")
            .unwrap_or_else(|_| "postgres://localhost/sonate_test".to_string());
        SharedStores::build(&StoreBackend::Postgres { url })
            .await
            .expect("test database reachable")
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres instance"]
    async fn postgres_nonce_claimed_exactly_once() {
        let stores = shared_stores().await;
        let nonce = format!("it-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        stores.nonces.mark_used(&nonce, 60).await.unwrap();
        assert!(matches!(
            stores.nonces.mark_used(&nonce, 60).await,
            Err(StoreError::NonceAlreadyUsed(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres instance"]
    async fn postgres_revocation_roundtrip() {
        let stores = shared_stores().await;
        let subject = format!("it-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        stores
            .revocations
            .revoke(&subject, "integration", None)
            .await
            .unwrap();
        assert!(stores.revocations.is_revoked(&subject).await.unwrap());
    }
}
