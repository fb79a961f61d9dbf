use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{
    error::{AppError, Res},
    plan::Plan,
};
use sqlx::PgPool;

use crate::{
    dtos::subscription::PlanChange,
    models::{subscription::Subscription, user::User},
};

/// Durable user and subscription records.
///
/// Every mutation of `used_this_month` goes through a conditional update that
/// the store evaluates atomically. Implementations never read, modify and
/// write back a counter from application code.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Res<Option<User>>;

    async fn get_subscription(&self, user_id: i64) -> Res<Option<Subscription>>;

    /// Increments `used_this_month` if it is still below `monthly_quota`.
    /// Returns whether a record was updated.
    async fn increment_usage_within_quota(&self, user_id: i64) -> Res<bool>;

    /// Writes a plan transition as one update. `None` if the user has no subscription.
    async fn apply_plan(&self, user_id: i64, change: &PlanChange) -> Res<Option<Subscription>>;

    async fn list_subscriptions_by_plan(&self, plan: Plan) -> Res<Vec<Subscription>>;

    /// Applies `change` only while the record is on Pro and ends at `expected_end_date`.
    async fn downgrade_expired(
        &self,
        user_id: i64,
        expected_end_date: DateTime<Utc>,
        change: &PlanChange,
    ) -> Res<bool>;

    /// Resets usage of every record whose period precedes `period`.
    /// Returns the number of records reset.
    async fn roll_over_usage(&self, period: NaiveDate) -> Res<u64>;
}

/// PostgreSQL backed store. Each call is bounded by `timeout`; an elapsed call
/// surfaces as [`AppError::StoreUnavailable`].
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: Arc<PgPool>,
    timeout: Duration,
}

impl PgSubscriptionStore {
    pub fn new(pool: Arc<PgPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Res<T>>) -> Res<T> {
        bounded(self.timeout, op, fut).await
    }
}

/// Runs `fut` for at most `timeout`. An elapsed call becomes
/// [`AppError::StoreUnavailable`], which callers surface as a retryable 503.
pub async fn bounded<T>(timeout: Duration, op: &str, fut: impl Future<Output = Res<T>>) -> Res<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(AppError::StoreUnavailable(format!(
            "{} timed out after {}ms",
            op,
            timeout.as_millis()
        ))),
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn get_user(&self, user_id: i64) -> Res<Option<User>> {
        self.bounded("get_user", crate::user::get_user_by_id(&*self.pool, user_id))
            .await
    }

    async fn get_subscription(&self, user_id: i64) -> Res<Option<Subscription>> {
        self.bounded(
            "get_subscription",
            crate::subscription::get_subscription_by_user_id(&*self.pool, user_id),
        )
        .await
    }

    async fn increment_usage_within_quota(&self, user_id: i64) -> Res<bool> {
        self.bounded(
            "increment_usage",
            crate::subscription::increment_usage_within_quota(&*self.pool, user_id),
        )
        .await
    }

    async fn apply_plan(&self, user_id: i64, change: &PlanChange) -> Res<Option<Subscription>> {
        self.bounded(
            "apply_plan",
            crate::subscription::update_plan(&*self.pool, user_id, change),
        )
        .await
    }

    async fn list_subscriptions_by_plan(&self, plan: Plan) -> Res<Vec<Subscription>> {
        self.bounded(
            "list_subscriptions",
            crate::subscription::get_subscriptions_by_plan(&*self.pool, plan),
        )
        .await
    }

    async fn downgrade_expired(
        &self,
        user_id: i64,
        expected_end_date: DateTime<Utc>,
        change: &PlanChange,
    ) -> Res<bool> {
        self.bounded(
            "downgrade_expired",
            crate::subscription::downgrade_expired(
                &*self.pool,
                user_id,
                expected_end_date,
                change,
            ),
        )
        .await
    }

    async fn roll_over_usage(&self, period: NaiveDate) -> Res<u64> {
        self.bounded(
            "roll_over_usage",
            crate::subscription::roll_over_usage(&*self.pool, period),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_call_is_retryable_unavailable() {
        let res: Res<()> = bounded(
            Duration::from_millis(2000),
            "get_subscription",
            std::future::pending(),
        )
        .await;

        let err = res.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(ref msg) if msg.contains("2000ms")));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_call_passes_through() {
        let res = bounded(Duration::from_millis(2000), "get_user", async {
            Err::<(), _>(AppError::NotFound("User 1 not found".to_string()))
        })
        .await;

        assert!(matches!(res, Err(AppError::NotFound(_))));
    }
}
