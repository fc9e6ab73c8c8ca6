use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::utils::ApiError;

const KEY_PREFIX: &str = "login_attempts";

/// Counter-store failure. Only ever logged: the limiter fails open.
#[derive(Debug)]
pub struct CounterError(pub String);

impl std::fmt::Display for CounterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal counter surface the limiter needs from the shared store.
#[rocket::async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr(&self, key: &str) -> Result<i64, CounterError>;
    async fn expire(&self, key: &str, seconds: i64) -> Result<(), CounterError>;
    async fn ttl(&self, key: &str) -> Result<i64, CounterError>;
    async fn del(&self, key: &str) -> Result<(), CounterError>;
}

pub struct RedisCounterStore {
    client: redis::Client,
}

impl RedisCounterStore {
    pub fn new(client: redis::Client) -> Self {
        RedisCounterStore { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CounterError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CounterError(e.to_string()))
    }
}

#[rocket::async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterError> {
        let mut conn = self.connection().await?;
        conn.incr(key, 1)
            .await
            .map_err(|e| CounterError(e.to_string()))
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<(), CounterError> {
        let mut conn = self.connection().await?;
        conn.expire::<_, ()>(key, seconds)
            .await
            .map_err(|e| CounterError(e.to_string()))
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterError> {
        let mut conn = self.connection().await?;
        conn.ttl(key).await.map_err(|e| CounterError(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), CounterError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CounterError(e.to_string()))
    }
}

/// Opaque handle to one (identity, ip) failure counter.
#[derive(Debug, Clone)]
pub struct AttemptKey(String);

/// Per-(email, ip) failed-login limiter over a shared counter store.
///
/// Fail-open by policy: when the store is missing or errors, every operation
/// logs and no-ops so an infrastructure outage never blocks logins.
pub struct RateLimiter {
    store: Option<Box<dyn CounterStore>>,
}

impl RateLimiter {
    pub const MAX_ATTEMPTS: i64 = 3;
    pub const WINDOW_MINUTES: i64 = 5;

    pub fn new(store: Option<Box<dyn CounterStore>>) -> Self {
        RateLimiter { store }
    }

    /// One-way digest of `email:ip`; only used as a counter key, so
    /// collisions are irrelevant.
    fn derive_key(email: &str, ip: &str) -> String {
        let digest = Sha256::digest(format!("{}:{}", email, ip).as_bytes());
        format!("{}:{}", KEY_PREFIX, hex::encode(digest))
    }

    /// Counts this attempt and rejects once the allowed attempts in the
    /// window are used up. Returns `None` when the store is unavailable.
    pub async fn check(&self, email: &str, ip: &str) -> Result<Option<AttemptKey>, ApiError> {
        let Some(store) = &self.store else {
            warn!("Counter store unavailable for rate limiting - allowing request");
            return Ok(None);
        };

        let key = Self::derive_key(email, ip);

        let count = match store.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Counter store unreachable: {} - allowing request", e);
                return Ok(None);
            }
        };

        if count == 1 {
            if let Err(e) = store.expire(&key, Self::WINDOW_MINUTES * 60).await {
                warn!("Failed to set rate-limit window: {} - allowing request", e);
                return Ok(None);
            }
        }

        if count > Self::MAX_ATTEMPTS {
            let ttl = store
                .ttl(&key)
                .await
                .unwrap_or(Self::WINDOW_MINUTES * 60)
                .max(0);
            info!("Rate limited {} for {} more seconds", key, ttl);
            return Err(ApiError::too_many_requests(format!(
                "Too many failed login attempts. Try again in {} seconds.",
                ttl
            )));
        }

        Ok(Some(AttemptKey(key)))
    }

    /// Extra failure bump outside the check path. Refreshes the window.
    pub async fn record_failure(&self, key: Option<&AttemptKey>) {
        let (Some(store), Some(key)) = (&self.store, key) else {
            return;
        };

        if let Err(e) = store.incr(&key.0).await {
            warn!("Counter store unreachable recording failure: {}", e);
            return;
        }
        if let Err(e) = store.expire(&key.0, Self::WINDOW_MINUTES * 60).await {
            warn!("Counter store unreachable refreshing window: {}", e);
        }
    }

    /// Resets the failure streak after a successful authentication.
    pub async fn clear(&self, key: Option<&AttemptKey>) {
        let (Some(store), Some(key)) = (&self.store, key) else {
            return;
        };

        if let Err(e) = store.del(&key.0).await {
            warn!("Counter store unreachable clearing attempts: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryStore {
        counters: Mutex<HashMap<String, (i64, i64)>>, // count, window seconds
    }

    impl MemoryStore {
        fn new() -> Self {
            MemoryStore {
                counters: Mutex::new(HashMap::new()),
            }
        }
    }

    #[rocket::async_trait]
    impl CounterStore for MemoryStore {
        async fn incr(&self, key: &str) -> Result<i64, CounterError> {
            let mut counters = self.counters.lock().unwrap();
            let entry = counters.entry(key.to_string()).or_insert((0, -1));
            entry.0 += 1;
            Ok(entry.0)
        }

        async fn expire(&self, key: &str, seconds: i64) -> Result<(), CounterError> {
            let mut counters = self.counters.lock().unwrap();
            if let Some(entry) = counters.get_mut(key) {
                entry.1 = seconds;
            }
            Ok(())
        }

        async fn ttl(&self, key: &str) -> Result<i64, CounterError> {
            let counters = self.counters.lock().unwrap();
            Ok(counters.get(key).map(|e| e.1).unwrap_or(-2))
        }

        async fn del(&self, key: &str) -> Result<(), CounterError> {
            self.counters.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct BrokenStore;

    #[rocket::async_trait]
    impl CounterStore for BrokenStore {
        async fn incr(&self, _: &str) -> Result<i64, CounterError> {
            Err(CounterError("connection refused".into()))
        }
        async fn expire(&self, _: &str, _: i64) -> Result<(), CounterError> {
            Err(CounterError("connection refused".into()))
        }
        async fn ttl(&self, _: &str) -> Result<i64, CounterError> {
            Err(CounterError("connection refused".into()))
        }
        async fn del(&self, _: &str) -> Result<(), CounterError> {
            Err(CounterError("connection refused".into()))
        }
    }

    #[test]
    fn key_derivation_is_deterministic_and_ip_scoped() {
        let a = RateLimiter::derive_key("a@b.com", "1.2.3.4");
        let b = RateLimiter::derive_key("a@b.com", "1.2.3.4");
        let c = RateLimiter::derive_key("a@b.com", "5.6.7.8");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("login_attempts:"));
    }

    #[rocket::async_test]
    async fn fourth_check_in_window_is_limited() {
        let limiter = RateLimiter::new(Some(Box::new(MemoryStore::new())));

        for _ in 0..3 {
            let key = limiter.check("rider@example.com", "1.2.3.4").await.unwrap();
            assert!(key.is_some());
        }

        let limited = limiter.check("rider@example.com", "1.2.3.4").await;
        let err = limited.expect_err("expected rate limit");
        assert_eq!(err.status, rocket::http::Status::TooManyRequests);
        assert!(err.message.contains("Try again in"));
    }

    #[rocket::async_test]
    async fn clear_starts_a_fresh_window() {
        let limiter = RateLimiter::new(Some(Box::new(MemoryStore::new())));

        for _ in 0..3 {
            limiter.check("rider@example.com", "1.2.3.4").await.unwrap();
        }
        let key = RateLimiter::derive_key("rider@example.com", "1.2.3.4");
        limiter.clear(Some(&AttemptKey(key))).await;

        // First check after clear counts from 1 again.
        let key = limiter.check("rider@example.com", "1.2.3.4").await.unwrap();
        assert!(key.is_some());
    }

    #[rocket::async_test]
    async fn different_ip_is_a_separate_counter() {
        let limiter = RateLimiter::new(Some(Box::new(MemoryStore::new())));

        for _ in 0..3 {
            limiter.check("rider@example.com", "1.2.3.4").await.unwrap();
        }
        assert!(limiter.check("rider@example.com", "1.2.3.4").await.is_err());
        assert!(limiter
            .check("rider@example.com", "9.9.9.9")
            .await
            .unwrap()
            .is_some());
    }

    #[rocket::async_test]
    async fn record_failure_counts_toward_the_limit() {
        let limiter = RateLimiter::new(Some(Box::new(MemoryStore::new())));

        let key = limiter
            .check("rider@example.com", "1.2.3.4")
            .await
            .unwrap()
            .unwrap();
        limiter.record_failure(Some(&key)).await;
        limiter.record_failure(Some(&key)).await;

        // Counter sits at 3; the next check pushes it past the limit.
        assert!(limiter.check("rider@example.com", "1.2.3.4").await.is_err());
    }

    #[rocket::async_test]
    async fn unreachable_store_fails_open() {
        let limiter = RateLimiter::new(Some(Box::new(BrokenStore)));

        for _ in 0..10 {
            let key = limiter.check("rider@example.com", "1.2.3.4").await.unwrap();
            assert!(key.is_none());
        }
        // No-ops, never panics or errors.
        limiter.record_failure(None).await;
        limiter.clear(None).await;
    }

    #[rocket::async_test]
    async fn missing_store_fails_open() {
        let limiter = RateLimiter::new(None);
        let key = limiter.check("rider@example.com", "1.2.3.4").await.unwrap();
        assert!(key.is_none());
    }
}
