//! Sonate Rate Limiter - fixed-window admission control.
//!
//! Quota is enforced per `(identifier type, identifier, endpoint)` key over
//! discrete, non-overlapping windows. The counter increment is atomic in the
//! backing store; denied requests still count, so probing a saturated key
//! cannot reset its window. Backend failure behavior is explicit and fixed
//! at construction: fail-closed (default) rejects, fail-open admits and
//! logs.

#![deny(unsafe_code)]

pub mod counter;
pub mod error;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use counter::{CounterStore, MemoryCounterStore};
pub use error::RateLimitError;
pub use postgres::PostgresCounterStore;

/// What a window is keyed by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitKey {
    pub identifier_type: String,
    pub identifier: String,
    pub endpoint: String,
}

impl RateLimitKey {
    pub fn new(
        identifier_type: impl Into<String>,
        identifier: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            identifier_type: identifier_type.into(),
            identifier: identifier.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Storage key; also the prefix unit for administrative resets.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.identifier_type, self.identifier, self.endpoint
        )
    }
}

/// One admission check request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub key: RateLimitKey,
    pub max_requests: u64,
    pub window_ms: i64,
}

/// Machine-readable admission decision; maps onto HTTP 429 without
/// inspecting internals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
    pub retry_after_secs: Option<u64>,
}

/// Behavior when the counter store is unreachable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit and log. Availability over strictness.
    FailOpen,
    /// Reject. Strictness over availability.
    #[default]
    FailClosed,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    policy: FailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    /// Process-local limiter with the default fail-closed policy.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()), FailurePolicy::default())
    }

    /// Atomically count this request against the current window and decide.
    pub async fn check_limit(&self, config: &RateLimitConfig) -> RateLimitDecision {
        let now_ms = Utc::now().timestamp_millis();
        let window_start = (now_ms / config.window_ms) * config.window_ms;
        let reset_ms = window_start + config.window_ms;
        let reset_at = Utc
            .timestamp_millis_opt(reset_ms)
            .single()
            .unwrap_or_else(Utc::now);
        let retry_after = (reset_ms - now_ms).max(0) as u64 / 1000 + 1;

        let count = match self
            .store
            .increment(&config.key.storage_key(), window_start, config.window_ms)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                return match self.policy {
                    FailurePolicy::FailOpen => {
                        warn!(key = %config.key.storage_key(), error = %e,
                              "counter store unavailable, admitting (fail-open)");
                        RateLimitDecision {
                            allowed: true,
                            remaining: 0,
                            reset_at,
                            retry_after_secs: None,
                        }
                    }
                    FailurePolicy::FailClosed => {
                        warn!(key = %config.key.storage_key(), error = %e,
                              "counter store unavailable, rejecting (fail-closed)");
                        RateLimitDecision {
                            allowed: false,
                            remaining: 0,
                            reset_at,
                            retry_after_secs: Some(retry_after),
                        }
                    }
                };
            }
        };

        if count <= config.max_requests {
            RateLimitDecision {
                allowed: true,
                remaining: config.max_requests - count,
                reset_at,
                retry_after_secs: None,
            }
        } else {
            debug!(key = %config.key.storage_key(), count, limit = config.max_requests,
                   "request rejected by quota");
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
                retry_after_secs: Some(retry_after),
            }
        }
    }

    /// Administrative override: clear every window under a key prefix.
    pub async fn reset_limit(&self, key_prefix: &str) -> Result<u64, RateLimitError> {
        self.store.reset_prefix(key_prefix).await
    }

    /// Purge expired windows in backends that need manual GC.
    pub async fn cleanup(&self) -> Result<u64, RateLimitError> {
        self.store.purge_expired(Utc::now().timestamp_millis()).await
    }
}
