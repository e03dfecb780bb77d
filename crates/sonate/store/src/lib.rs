//! Sonate Store - anti-replay and revocation state.
//!
//! Two small key/TTL stores with one correctness property each: a nonce can
//! be claimed exactly once within its TTL, and a revocation, once present,
//! answers true until it expires. Each trait has a process-local in-memory
//! backend and a shared Postgres backend; callers must not assume which is
//! active.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::StoreError;
pub use memory::{MemoryNonceStore, MemoryRevocationStore};
pub use postgres::{PostgresNonceStore, PostgresRevocationStore};

/// A claimed nonce. Created on first use, never updated, garbage-collected
/// after expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NonceRecord {
    pub value: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A revocation. Once present, the subject stays revoked until the record
/// expires; a record without `expires_at` is permanent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub subject_id: String,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Claim-once nonce semantics. The insert-if-absent must be atomic against
/// concurrent callers on the same nonce.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Claim a nonce for `ttl_seconds`. Fails with
    /// [`StoreError::NonceAlreadyUsed`] if it was claimed within its TTL.
    async fn mark_used(&self, nonce: &str, ttl_seconds: i64) -> Result<(), StoreError>;

    /// Whether the nonce is currently claimed (expired claims answer false).
    async fn is_used(&self, nonce: &str) -> Result<bool, StoreError>;

    /// Drop expired claims; returns how many were purged.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// Revocation semantics. `revoke` is idempotent.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark a subject revoked. `ttl_seconds: None` means permanent.
    async fn revoke(
        &self,
        subject_id: &str,
        reason: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<(), StoreError>;

    async fn is_revoked(&self, subject_id: &str) -> Result<bool, StoreError>;

    /// The active revocation record, if any.
    async fn revocation(&self, subject_id: &str) -> Result<Option<RevocationRecord>, StoreError>;
}

/// Backend selection, by configuration only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local, best-effort.
    Memory,
    /// Shared Postgres, authoritative across processes.
    Postgres { url: String },
}

/// The pair of stores the trust substrate consumes.
#[derive(Clone)]
pub struct SharedStores {
    pub nonces: Arc<dyn NonceStore>,
    pub revocations: Arc<dyn RevocationStore>,
}

impl SharedStores {
    /// Build both stores against the configured backend.
    pub async fn build(backend: &StoreBackend) -> Result<Self, StoreError> {
        match backend {
            StoreBackend::Memory => Ok(Self {
                nonces: Arc::new(MemoryNonceStore::new()),
                revocations: Arc::new(MemoryRevocationStore::new()),
            }),
            StoreBackend::Postgres { url } => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(8)
                    .connect(url)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                postgres::ensure_schema(&pool).await?;
                Ok(Self {
                    nonces: Arc::new(PostgresNonceStore::new(pool.clone())),
                    revocations: Arc::new(PostgresRevocationStore::new(pool)),
                })
            }
        }
    }

    /// Process-local stores, for tests and single-node deployments.
    pub fn in_memory() -> Self {
        Self {
            nonces: Arc::new(MemoryNonceStore::new()),
            revocations: Arc::new(MemoryRevocationStore::new()),
        }
    }
}
