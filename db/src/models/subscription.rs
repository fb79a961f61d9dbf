use chrono::{DateTime, NaiveDate, Utc};
use common::plan::Plan;
use serde::{Deserialize, Serialize};

/// Subscription record, one per user.
///
/// `used_this_month` counts consumed requests of the month starting at
/// `usage_period`. It only grows through the store's conditional increment.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user_id: i64,
    pub plan: Plan,
    pub monthly_quota: i32,
    pub used_this_month: i32,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub usage_period: NaiveDate,
}

impl Subscription {
    pub fn remaining(&self) -> i32 {
        (self.monthly_quota - self.used_this_month).max(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_this_month >= self.monthly_quota
    }
}
