//! In-memory backends. Atomicity comes from doing the check and the insert
//! inside one `parking_lot::Mutex` critical section per store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::StoreError;
use crate::{NonceRecord, NonceStore, RevocationRecord, RevocationStore};

pub struct MemoryNonceStore {
    nonces: Mutex<HashMap<String, NonceRecord>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn mark_used(&self, nonce: &str, ttl_seconds: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut nonces = self.nonces.lock();

        if let Some(existing) = nonces.get(nonce) {
            if existing.expires_at > now {
                warn!(nonce, "nonce replay rejected");
                return Err(StoreError::NonceAlreadyUsed(nonce.to_string()));
            }
        }

        nonces.insert(
            nonce.to_string(),
            NonceRecord {
                value: nonce.to_string(),
                claimed_at: now,
                expires_at: now + Duration::seconds(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn is_used(&self, nonce: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        let nonces = self.nonces.lock();
        Ok(nonces.get(nonce).is_some_and(|r| r.expires_at > now))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut nonces = self.nonces.lock();
        let before = nonces.len();
        nonces.retain(|_, r| r.expires_at > now);
        Ok((before - nonces.len()) as u64)
    }
}

pub struct MemoryRevocationStore {
    revocations: Mutex<HashMap<String, RevocationRecord>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self {
            revocations: Mutex::new(HashMap::new()),
        }
    }

    fn active(record: &RevocationRecord) -> bool {
        match record.expires_at {
            Some(expires_at) => expires_at > Utc::now(),
            None => true,
        }
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(
        &self,
        subject_id: &str,
        reason: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut revocations = self.revocations.lock();

        // Idempotent: an active revocation is left untouched.
        if revocations.get(subject_id).is_some_and(Self::active) {
            return Ok(());
        }

        warn!(subject_id, reason, "subject revoked");
        revocations.insert(
            subject_id.to_string(),
            RevocationRecord {
                subject_id: subject_id.to_string(),
                reason: reason.to_string(),
                revoked_at: now,
                expires_at: ttl_seconds.map(|ttl| now + Duration::seconds(ttl)),
            },
        );
        Ok(())
    }

    async fn is_revoked(&self, subject_id: &str) -> Result<bool, StoreError> {
        let revocations = self.revocations.lock();
        Ok(revocations.get(subject_id).is_some_and(Self::active))
    }

    async fn revocation(&self, subject_id: &str) -> Result<Option<RevocationRecord>, StoreError> {
        let revocations = self.revocations.lock();
        Ok(revocations
            .get(subject_id)
            .filter(|r| Self::active(r))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn nonce_claimed_exactly_once() {
        let store = MemoryNonceStore::new();
        store.mark_used("n1", 60).await.unwrap();
        assert!(matches!(
            store.mark_used("n1", 60).await,
            Err(StoreError::NonceAlreadyUsed(_))
        ));
        assert!(store.is_used("n1").await.unwrap());
        assert!(!store.is_used("n2").await.unwrap());
    }

    #[tokio::test]
    async fn expired_nonce_can_be_reclaimed() {
        let store = MemoryNonceStore::new();
        store.mark_used("n1", -1).await.unwrap();
        assert!(!store.is_used("n1").await.unwrap());
        store.mark_used("n1", 60).await.unwrap();
        assert!(store.is_used("n1").await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = MemoryNonceStore::new();
        store.mark_used("live", 60).await.unwrap();
        store.mark_used("dead", -1).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.is_used("live").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_admit_one_winner() {
        let store = Arc::new(MemoryNonceStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.mark_used("shared", 60).await },
            ));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = MemoryRevocationStore::new();
        store.revoke("cred-1", "key compromise", None).await.unwrap();
        store.revoke("cred-1", "duplicate call", None).await.unwrap();

        let record = store.revocation("cred-1").await.unwrap().unwrap();
        assert_eq!(record.reason, "key compromise");
        assert!(store.is_revoked("cred-1").await.unwrap());
    }

    #[tokio::test]
    async fn revocation_without_ttl_is_permanent() {
        let store = MemoryRevocationStore::new();
        store.revoke("cred-1", "gone", None).await.unwrap();
        let record = store.revocation("cred-1").await.unwrap().unwrap();
        assert!(record.expires_at.is_none());
    }

    #[tokio::test]
    async fn expired_revocation_stops_answering() {
        let store = MemoryRevocationStore::new();
        store.revoke("cred-1", "temporary", Some(-1)).await.unwrap();
        assert!(!store.is_revoked("cred-1").await.unwrap());
        assert!(store.revocation("cred-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_subject_is_not_revoked() {
        let store = MemoryRevocationStore::new();
        assert!(!store.is_revoked("nobody").await.unwrap());
    }
}
