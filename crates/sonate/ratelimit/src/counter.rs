//! The counter-store contract and the in-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::RateLimitError;

/// Atomic per-window counters. `increment` must be atomic with respect to
/// concurrent callers on the same key; this is the property the whole
/// limiter rests on.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `(key, window_start)` and return the count
    /// after the increment. The window expires `window_ms` after its start.
    async fn increment(
        &self,
        key: &str,
        window_start_ms: i64,
        window_ms: i64,
    ) -> Result<u64, RateLimitError>;

    /// Clear all windows whose key starts with `prefix`; returns how many.
    async fn reset_prefix(&self, prefix: &str) -> Result<u64, RateLimitError>;

    /// Drop windows that ended before `now_ms`; returns how many.
    async fn purge_expired(&self, now_ms: i64) -> Result<u64, RateLimitError>;
}

struct Window {
    count: u64,
    expires_ms: i64,
}

/// Process-local counter store; atomicity via a single critical section.
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<(String, i64), Window>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        window_start_ms: i64,
        window_ms: i64,
    ) -> Result<u64, RateLimitError> {
        let mut windows = self.windows.lock();
        let window = windows
            .entry((key.to_string(), window_start_ms))
            .or_insert(Window {
                count: 0,
                expires_ms: window_start_ms + window_ms,
            });
        window.count += 1;
        Ok(window.count)
    }

    async fn reset_prefix(&self, prefix: &str) -> Result<u64, RateLimitError> {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|(key, _), _| !key.starts_with(prefix));
        Ok((before - windows.len()) as u64)
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<u64, RateLimitError> {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| window.expires_ms > now_ms);
        Ok((before - windows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_returns_post_increment_count() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("k", 0, 1_000).await.unwrap(), 1);
        assert_eq!(store.increment("k", 0, 1_000).await.unwrap(), 2);
        assert_eq!(store.increment("k", 1_000, 1_000).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_prefix_only_touches_matching_keys() {
        let store = MemoryCounterStore::new();
        store.increment("user:a:/x", 0, 1_000).await.unwrap();
        store.increment("user:b:/x", 0, 1_000).await.unwrap();

        assert_eq!(store.reset_prefix("user:a").await.unwrap(), 1);
        assert_eq!(store.increment("user:b:/x", 0, 1_000).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn purge_drops_ended_windows() {
        let store = MemoryCounterStore::new();
        store.increment("k", 0, 1_000).await.unwrap();
        store.increment("k", 10_000, 1_000).await.unwrap();

        assert_eq!(store.purge_expired(5_000).await.unwrap(), 1);
        // The live window keeps its count.
        assert_eq!(store.increment("k", 10_000, 1_000).await.unwrap(), 2);
    }
}
