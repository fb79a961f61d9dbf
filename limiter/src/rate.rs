use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use common::{
    env_config::RateLimitConfig,
    error::{AppError, Res},
};

use crate::counter::CounterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited,
}

/// Fixed-window request-rate limiter over a shared [`CounterStore`].
///
/// Windows start at wall-clock multiples of the window length, so a client can
/// burst up to twice the threshold across a boundary. Store failures and
/// timeouts admit the request: availability wins over strict enforcement here.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn admit(&self, user_id: i64) -> Admission {
        self.admit_at(user_id, Utc::now()).await
    }

    pub async fn admit_at(&self, user_id: i64, now: DateTime<Utc>) -> Admission {
        let key = window_key(user_id, now, self.config.window);

        match self.count(&key).await {
            Ok(count) if count > self.config.max_requests => {
                log::debug!(
                    "Rate limit reached for user {}: {}/{} in window {}",
                    user_id,
                    count,
                    self.config.max_requests,
                    key
                );
                Admission::Limited
            }
            Ok(_) => Admission::Allowed,
            Err(e) => {
                log::warn!(
                    "Counter store unavailable, admitting request for user {}: {}",
                    user_id,
                    e
                );
                Admission::Allowed
            }
        }
    }

    async fn count(&self, key: &str) -> Res<i64> {
        let count = self.bounded("INCR", self.store.incr(key)).await?;

        // first hit of the window owns the expiry
        if count == 1 {
            if let Err(e) = self
                .bounded("EXPIRE", self.store.expire(key, self.config.window))
                .await
            {
                log::warn!("Failed to set expiry on {}: {}", key, e);
            }
        }

        Ok(count)
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Res<T>>) -> Res<T> {
        tokio::time::timeout(self.config.store_timeout, fut)
            .await
            .map_err(|_| {
                AppError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    op,
                    self.config.store_timeout.as_millis()
                ))
            })?
    }
}

/// Identifier of the window containing `now`: its start time at minute
/// granularity, or second granularity when the window length is not a whole
/// number of minutes.
pub fn window_id(now: DateTime<Utc>, window: Duration) -> String {
    let secs = window.as_secs().max(1) as i64;
    let start_ts = now.timestamp() - now.timestamp().rem_euclid(secs);
    let start = DateTime::<Utc>::from_timestamp(start_ts, 0).unwrap_or(now);

    if secs % 60 == 0 {
        start.format("%Y%m%d%H%M").to_string()
    } else {
        start.format("%Y%m%d%H%M%S").to_string()
    }
}

/// Counter key for a user's window: `ratelimit:{user_id}:{window}`.
pub fn window_key(user_id: i64, now: DateTime<Utc>, window: Duration) -> String {
    format!("ratelimit:{}:{}", user_id, window_id(now, window))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::counter::MemoryCounterStore;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    fn limiter(store: Arc<MemoryCounterStore>) -> RateLimiter {
        RateLimiter::new(store, RateLimitConfig::default())
    }

    #[test]
    fn window_key_truncates_to_the_minute() {
        let window = Duration::from_secs(60);
        assert_eq!(window_key(7, at(14, 3, 59), window), "ratelimit:7:202610191403");
        assert_eq!(window_key(7, at(14, 3, 0), window), "ratelimit:7:202610191403");
        assert_eq!(window_key(7, at(14, 4, 0), window), "ratelimit:7:202610191404");
    }

    #[test]
    fn sub_minute_windows_keep_seconds() {
        let window = Duration::from_secs(15);
        assert_eq!(window_id(at(14, 3, 29), window), "20261019140315");
        assert_eq!(window_id(at(14, 3, 30), window), "20261019140330");
    }

    #[tokio::test]
    async fn admits_up_to_threshold_per_window() {
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = limiter(store.clone());
        let now = at(9, 30, 10);

        for _ in 0..100 {
            assert_eq!(limiter.admit_at(1, now).await, Admission::Allowed);
        }
        assert_eq!(limiter.admit_at(1, now).await, Admission::Limited);
        assert_eq!(limiter.admit_at(1, at(9, 30, 59)).await, Admission::Limited);

        // other users keep their own windows
        assert_eq!(limiter.admit_at(2, now).await, Admission::Allowed);

        // the next window starts from scratch
        assert_eq!(limiter.admit_at(1, at(9, 31, 0)).await, Admission::Allowed);
        assert_eq!(store.value("ratelimit:1:202610190930"), Some(102));
        assert_eq!(store.value("ratelimit:1:202610190931"), Some(1));
    }

    #[tokio::test]
    async fn burst_across_boundary_reaches_twice_the_threshold() {
        let limiter = limiter(Arc::new(MemoryCounterStore::new()));

        let mut admitted = 0;
        for now in [at(9, 30, 59), at(9, 31, 0)] {
            for _ in 0..150 {
                if limiter.admit_at(3, now).await == Admission::Allowed {
                    admitted += 1;
                }
            }
        }
        assert_eq!(admitted, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn first_hit_sets_window_ttl() {
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = limiter(store.clone());
        let now = at(9, 30, 10);
        let key = window_key(1, now, Duration::from_secs(60));

        limiter.admit_at(1, now).await;
        assert_eq!(store.ttl(&key), Some(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(20)).await;
        limiter.admit_at(1, now).await;
        assert_eq!(store.ttl(&key), Some(Duration::from_secs(40)));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert_eq!(store.value(&key), None);
    }

    #[tokio::test]
    async fn fails_open_when_store_errors() {
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = limiter(store.clone());
        store.set_failing(true);

        for _ in 0..150 {
            assert_eq!(limiter.admit_at(1, at(9, 30, 10)).await, Admission::Allowed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fails_open_when_store_times_out() {
        let store = Arc::new(MemoryCounterStore::new());
        store.set_latency(Some(Duration::from_secs(5)));
        let limiter = limiter(store.clone());

        assert_eq!(limiter.admit_at(1, at(9, 30, 10)).await, Admission::Allowed);
    }
}
