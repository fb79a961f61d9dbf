use chrono::{DateTime, Utc};
use common::plan::Plan;
use db::models::subscription::Subscription;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeResponse {
    pub success: bool,
    pub message: String,
    pub monthly_quota: i32,
    pub used_this_month: i32,
}

impl From<&Subscription> for UpgradeResponse {
    fn from(sub: &Subscription) -> Self {
        UpgradeResponse {
            success: true,
            message: format!("Successfully upgraded to {} plan", sub.plan),
            monthly_quota: sub.monthly_quota,
            used_this_month: sub.used_this_month,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub user_id: i64,
    pub plan: Plan,
    pub monthly_quota: i32,
    pub used_this_month: i32,
    pub remaining: i32,
    pub subscription_end_date: Option<DateTime<Utc>>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        SubscriptionResponse {
            remaining: sub.remaining(),
            user_id: sub.user_id,
            plan: sub.plan,
            monthly_quota: sub.monthly_quota,
            used_this_month: sub.used_this_month,
            subscription_end_date: sub.subscription_end_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub data: &'static str,
}
