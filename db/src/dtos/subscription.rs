use chrono::{DateTime, NaiveDate, Utc};
use common::plan::Plan;

/// Every field a plan transition writes, applied to a subscription as one unit.
/// Usage is always reset to zero alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanChange {
    pub plan: Plan,
    pub monthly_quota: i32,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub usage_period: NaiveDate,
}
