use actix_web::{Responder, get, post, web};
use common::{error::Res, http::Success};

use crate::{
    dtos::sub::{SubscriptionResponse, UpgradeRequest, UpgradeResponse},
    services::sub::PlanManager,
};

/// Moves a user to another plan.
///
/// # Input
/// - `user_id`: path segment
/// - body: `{ "plan": "Free" | "Pro" }`
///
/// # Output
/// - 200 `{ success, message, monthlyQuota, usedThisMonth }`
/// - 404 if the user is unknown (checked before the plan name)
/// - 400 if the plan is neither `Free` nor `Pro`
#[post("/user/{user_id}")]
pub async fn post_upgrade(
    path: web::Path<i64>,
    req: web::Json<UpgradeRequest>,
    plans: web::Data<PlanManager>,
) -> Res<impl Responder> {
    let user_id = path.into_inner();
    let subscription = plans.change_plan(user_id, &req.plan).await?;
    Success::ok(UpgradeResponse::from(&subscription))
}

/// Current plan and usage of a user. Neither throttled nor metered.
#[get("/user/{user_id}")]
pub async fn get_subscription(
    path: web::Path<i64>,
    plans: web::Data<PlanManager>,
) -> Res<impl Responder> {
    let subscription = plans.get_subscription(path.into_inner()).await?;
    Success::ok(SubscriptionResponse::from(subscription))
}
