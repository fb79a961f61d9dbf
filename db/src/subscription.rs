use chrono::{DateTime, NaiveDate, Utc};
use common::{
    error::{AppError, Res},
    plan::Plan,
};
use sqlx::{Executor, Postgres};

use crate::{dtos::subscription::PlanChange, models::subscription::Subscription};

pub async fn get_subscription_by_user_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: i64,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_subscriptions_by_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    plan: Plan,
) -> Res<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE plan = $1 ORDER BY user_id",
    )
    .bind(plan)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Consumes one request of the monthly quota.
///
/// The predicate and the increment run as one statement, so concurrent callers
/// can never push `used_this_month` past `monthly_quota`. Returns `false` when
/// no row matched: the quota is used up, or the user has no subscription.
pub async fn increment_usage_within_quota<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: i64,
) -> Res<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET used_this_month = used_this_month + 1
        WHERE user_id = $1 AND used_this_month < monthly_quota
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected() == 1)
}

pub async fn update_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: i64,
    change: &PlanChange,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET plan = $2,
            monthly_quota = $3,
            used_this_month = 0,
            subscription_end_date = $4,
            usage_period = $5
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(change.plan)
    .bind(change.monthly_quota)
    .bind(change.subscription_end_date)
    .bind(change.usage_period)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Applies `change` only if the subscription is still on Pro with the end date
/// the caller saw. A renewal that landed after the caller's read is left alone.
pub async fn downgrade_expired<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: i64,
    expected_end_date: DateTime<Utc>,
    change: &PlanChange,
) -> Res<bool> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET plan = $3,
            monthly_quota = $4,
            used_this_month = 0,
            subscription_end_date = $5,
            usage_period = $6
        WHERE user_id = $1 AND plan = 'Pro' AND subscription_end_date = $2
        "#,
    )
    .bind(user_id)
    .bind(expected_end_date)
    .bind(change.plan)
    .bind(change.monthly_quota)
    .bind(change.subscription_end_date)
    .bind(change.usage_period)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected() == 1)
}

/// Starts a new usage period for every subscription still counting an older one.
pub async fn roll_over_usage<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    period: NaiveDate,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET used_this_month = 0, usage_period = $1
        WHERE usage_period < $1
        "#,
    )
    .bind(period)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected())
}
