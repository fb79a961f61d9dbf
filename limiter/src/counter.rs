use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use common::error::{AppError, Res};
use redis::AsyncCommands;
use tokio::time::Instant;

/// Shared counter store with atomic increments and per-key expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments `key` (creating it at zero) and returns the new value.
    async fn incr(&self, key: &str) -> Res<i64>;

    /// Lets `key` expire `ttl` from now.
    async fn expire(&self, key: &str, ttl: Duration) -> Res<()>;
}

/// Redis backed counters, `INCR` and `EXPIRE` over a connection pool.
#[derive(Clone)]
pub struct RedisCounterStore {
    pool: deadpool_redis::Pool,
}

impl RedisCounterStore {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Res<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::RedisPool(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Res<i64> {
        let mut conn = self.connection().await?;
        let count: i64 = conn.incr(key, 1).await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Res<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }
}

struct Counter {
    value: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process counters for tests and local runs.
///
/// Expiry follows the tokio clock, so a paused test runtime can move counters
/// past their TTL with `tokio::time::advance`.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as if Redis were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Current value of a live counter.
    pub fn value(&self, key: &str) -> Option<i64> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|counter| counter.is_live(now))
            .map(|counter| counter.value)
    }

    /// Remaining time to live of a live counter, `None` if it has no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|counter| counter.is_live(now))
            .and_then(|counter| counter.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of stored keys, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Counter>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate(&self) -> Res<()> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(
                "counter store connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Res<i64> {
        self.simulate().await?;
        let now = Instant::now();
        let mut counters = self.lock();
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if !counter.is_live(now) {
            counter.value = 0;
            counter.expires_at = None;
        }
        counter.value += 1;
        Ok(counter.value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Res<()> {
        self.simulate().await?;
        let now = Instant::now();
        if let Some(counter) = self.lock().get_mut(key) {
            if counter.is_live(now) {
                counter.expires_at = Some(now + ttl);
            }
        }
        Ok(())
    }
}
