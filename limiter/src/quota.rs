use std::sync::Arc;

use common::error::Res;
use db::store::SubscriptionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Consumed,
    QuotaExceeded,
    NotFound,
}

/// Monthly quota gate.
///
/// The store's conditional increment is the only gate; the preceding read just
/// turns away requests that are obviously over quota without attempting a
/// write. Store errors are returned to the caller unchanged, never mapped to
/// success or to `QuotaExceeded`.
pub struct QuotaEnforcer {
    store: Arc<dyn SubscriptionStore>,
}

impl QuotaEnforcer {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn try_consume(&self, user_id: i64) -> Res<Consumption> {
        let Some(subscription) = self.store.get_subscription(user_id).await? else {
            return Ok(Consumption::NotFound);
        };

        if subscription.is_exhausted() {
            log::debug!(
                "Monthly quota exhausted for user {}: {}/{}",
                user_id,
                subscription.used_this_month,
                subscription.monthly_quota
            );
            return Ok(Consumption::QuotaExceeded);
        }

        // zero rows: quota reached, or a concurrent request took the last unit
        if self.store.increment_usage_within_quota(user_id).await? {
            Ok(Consumption::Consumed)
        } else {
            log::debug!("Lost quota race for user {}", user_id);
            Ok(Consumption::QuotaExceeded)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use common::{error::AppError, plan::Plan};
    use db::{
        memory::InMemorySubscriptionStore,
        models::{subscription::Subscription, user::User},
    };

    use super::*;

    fn store_with(used: i32, quota: i32) -> Arc<InMemorySubscriptionStore> {
        let store = Arc::new(InMemorySubscriptionStore::new());
        store.insert(
            User {
                id: 1,
                email: "grace@example.com".to_string(),
            },
            Subscription {
                user_id: 1,
                plan: Plan::Free,
                monthly_quota: quota,
                used_this_month: used,
                subscription_end_date: None,
                usage_period: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            },
        );
        store
    }

    #[tokio::test]
    async fn consumes_one_unit_per_call() {
        let store = store_with(10, 1000);
        let enforcer = QuotaEnforcer::new(store.clone());

        assert_eq!(enforcer.try_consume(1).await.unwrap(), Consumption::Consumed);
        assert_eq!(store.subscription(1).unwrap().used_this_month, 11);
    }

    #[tokio::test]
    async fn exhausted_quota_leaves_state_unchanged() {
        let store = store_with(1000, 1000);
        let enforcer = QuotaEnforcer::new(store.clone());

        assert_eq!(
            enforcer.try_consume(1).await.unwrap(),
            Consumption::QuotaExceeded
        );
        assert_eq!(store.subscription(1).unwrap().used_this_month, 1000);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let enforcer = QuotaEnforcer::new(store_with(0, 1000));
        assert_eq!(enforcer.try_consume(42).await.unwrap(), Consumption::NotFound);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = store_with(0, 1000);
        store.set_unavailable(true);
        let enforcer = QuotaEnforcer::new(store.clone());

        let err = enforcer.try_consume(1).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn failed_write_is_not_reported_as_exceeded() {
        let store = store_with(0, 1000);
        store.fail_writes_for(1);
        let enforcer = QuotaEnforcer::new(store.clone());

        assert!(enforcer.try_consume(1).await.is_err());
        assert_eq!(store.subscription(1).unwrap().used_this_month, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_callers_never_overcount() {
        let store = store_with(990, 1000);
        let enforcer = Arc::new(QuotaEnforcer::new(store.clone()));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let enforcer = enforcer.clone();
                tokio::spawn(async move { enforcer.try_consume(1).await.unwrap() })
            })
            .collect();

        let mut consumed = 0;
        let mut exceeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Consumption::Consumed => consumed += 1,
                Consumption::QuotaExceeded => exceeded += 1,
                Consumption::NotFound => panic!("subscription disappeared"),
            }
        }

        assert_eq!(consumed, 10);
        assert_eq!(exceeded, 54);
        assert_eq!(store.subscription(1).unwrap().used_this_month, 1000);
    }
}
