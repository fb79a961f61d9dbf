use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{
    error::{AppError, Res},
    plan::Plan,
};

use crate::{
    dtos::subscription::PlanChange,
    models::{subscription::Subscription, user::User},
    store::SubscriptionStore,
};

#[derive(Default)]
struct Records {
    users: HashMap<i64, User>,
    subscriptions: HashMap<i64, Subscription>,
    unavailable: bool,
    failing_users: Vec<i64>,
}

/// In-process store for tests and local runs.
///
/// All records sit behind one lock, which makes each conditional update atomic
/// the same way a single SQL statement is.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: Mutex<Records>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User, subscription: Subscription) {
        let mut records = self.lock();
        records.subscriptions.insert(user.id, subscription);
        records.users.insert(user.id, user);
    }

    pub fn insert_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn subscription(&self, user_id: i64) -> Option<Subscription> {
        self.lock().subscriptions.get(&user_id).cloned()
    }

    /// Makes every call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Makes writes to one user's record fail while the rest keep working.
    pub fn fail_writes_for(&self, user_id: i64) {
        self.lock().failing_users.push(user_id);
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Res<MutexGuard<'_, Records>> {
        let records = self.lock();
        if records.unavailable {
            return Err(AppError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(records)
    }

    fn writable(&self, user_id: i64) -> Res<MutexGuard<'_, Records>> {
        let records = self.available()?;
        if records.failing_users.contains(&user_id) {
            return Err(AppError::StoreUnavailable(format!(
                "write to subscription {} failed",
                user_id
            )));
        }
        Ok(records)
    }
}

fn apply(subscription: &mut Subscription, change: &PlanChange) {
    subscription.plan = change.plan;
    subscription.monthly_quota = change.monthly_quota;
    subscription.used_this_month = 0;
    subscription.subscription_end_date = change.subscription_end_date;
    subscription.usage_period = change.usage_period;
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_user(&self, user_id: i64) -> Res<Option<User>> {
        Ok(self.available()?.users.get(&user_id).cloned())
    }

    async fn get_subscription(&self, user_id: i64) -> Res<Option<Subscription>> {
        Ok(self.available()?.subscriptions.get(&user_id).cloned())
    }

    async fn increment_usage_within_quota(&self, user_id: i64) -> Res<bool> {
        let mut records = self.writable(user_id)?;
        match records.subscriptions.get_mut(&user_id) {
            Some(sub) if sub.used_this_month < sub.monthly_quota => {
                sub.used_this_month += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_plan(&self, user_id: i64, change: &PlanChange) -> Res<Option<Subscription>> {
        let mut records = self.writable(user_id)?;
        Ok(records.subscriptions.get_mut(&user_id).map(|sub| {
            apply(sub, change);
            sub.clone()
        }))
    }

    async fn list_subscriptions_by_plan(&self, plan: Plan) -> Res<Vec<Subscription>> {
        let records = self.available()?;
        let mut subs: Vec<Subscription> = records
            .subscriptions
            .values()
            .filter(|sub| sub.plan == plan)
            .cloned()
            .collect();
        subs.sort_by_key(|sub| sub.user_id);
        Ok(subs)
    }

    async fn downgrade_expired(
        &self,
        user_id: i64,
        expected_end_date: DateTime<Utc>,
        change: &PlanChange,
    ) -> Res<bool> {
        let mut records = self.writable(user_id)?;
        match records.subscriptions.get_mut(&user_id) {
            Some(sub)
                if sub.plan == Plan::Pro
                    && sub.subscription_end_date == Some(expected_end_date) =>
            {
                apply(sub, change);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn roll_over_usage(&self, period: NaiveDate) -> Res<u64> {
        let mut records = self.available()?;
        let mut reset = 0;
        for sub in records.subscriptions.values_mut() {
            if sub.usage_period < period {
                sub.used_this_month = 0;
                sub.usage_period = period;
                reset += 1;
            }
        }
        Ok(reset)
    }
}
