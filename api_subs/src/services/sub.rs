use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use common::{
    error::{AppError, Res},
    plan::Plan,
};
use db::{
    dtos::subscription::PlanChange, models::subscription::Subscription,
    store::SubscriptionStore,
};

/// Applies plan transitions to subscriptions.
pub struct PlanManager {
    store: Arc<dyn SubscriptionStore>,
}

impl PlanManager {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Moves a user onto `plan`, resetting monthly usage.
    ///
    /// An unknown user is reported before an invalid plan name. Nothing is
    /// written unless both checks pass.
    pub async fn change_plan(&self, user_id: i64, plan: &str) -> Res<Subscription> {
        self.change_plan_at(user_id, plan, Utc::now()).await
    }

    pub async fn change_plan_at(
        &self,
        user_id: i64,
        plan: &str,
        now: DateTime<Utc>,
    ) -> Res<Subscription> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let plan: Plan = plan.parse()?;
        let change = plan_change(plan, now);

        let subscription = self
            .store
            .apply_plan(user_id, &change)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No subscription for user {}", user_id)))?;

        log::info!(
            "User {} moved to {} plan (quota {}, ends {:?})",
            user_id,
            subscription.plan,
            subscription.monthly_quota,
            subscription.subscription_end_date
        );
        Ok(subscription)
    }

    pub async fn get_subscription(&self, user_id: i64) -> Res<Subscription> {
        self.store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No subscription for user {}", user_id)))
    }
}

/// Everything a transition onto `plan` at `now` writes.
pub fn plan_change(plan: Plan, now: DateTime<Utc>) -> PlanChange {
    PlanChange {
        plan,
        monthly_quota: plan.monthly_quota(),
        subscription_end_date: plan.expires().then(|| one_month_after(now)),
        usage_period: month_start(now.date_naive()),
    }
}

/// Same day of the next month, clamped to its last day (Jan 31 -> Feb 28).
pub fn one_month_after(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(1))
        .unwrap_or(now + Duration::days(30))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
