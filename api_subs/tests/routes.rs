use std::{sync::Arc, time::Duration};

use actix_web::{App, http::StatusCode, test, web};
use api_subs::services::sub::PlanManager;
use chrono::NaiveDate;
use common::{env_config::RateLimitConfig, plan::Plan};
use db::{
    memory::InMemorySubscriptionStore,
    models::{subscription::Subscription, user::User},
};
use limiter::{counter::MemoryCounterStore, quota::QuotaEnforcer, rate::RateLimiter};
use serde_json::{Value, json};

fn seeded_store() -> Arc<InMemorySubscriptionStore> {
    let store = Arc::new(InMemorySubscriptionStore::new());
    store.insert(
        User {
            id: 1,
            email: "margaret@example.com".to_string(),
        },
        Subscription {
            user_id: 1,
            plan: Plan::Free,
            monthly_quota: 1000,
            used_this_month: 999,
            subscription_end_date: None,
            usage_period: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        },
    );
    store
}

macro_rules! api {
    ($store:expr) => {{
        let store = $store.clone();
        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            RateLimitConfig {
                max_requests: 100,
                window: Duration::from_secs(24 * 60 * 60),
                store_timeout: Duration::from_millis(250),
            },
        ));
        let quota = Arc::new(QuotaEnforcer::new(store.clone()));
        test::init_service(
            App::new()
                .app_data(web::Data::new(PlanManager::new(store.clone())))
                .service(
                    web::scope("/api")
                        .service(api_subs::mount_data().wrap(limiter::metering_middleware(
                            rate_limiter,
                            quota,
                            store.clone(),
                        )))
                        .service(api_subs::mount_upgrade())
                        .service(api_subs::mount_subs()),
                ),
        )
        .await
    }};
}

#[actix_web::test]
async fn upgrade_returns_new_quota() {
    let store = seeded_store();
    let app = api!(store);

    let req = test::TestRequest::post()
        .uri("/api/upgrade/user/1")
        .set_json(json!({ "plan": "Pro" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "Successfully upgraded to Pro plan",
            "monthlyQuota": 10000,
            "usedThisMonth": 0
        })
    );
    let sub = store.subscription(1).unwrap();
    assert_eq!(sub.plan, Plan::Pro);
    assert!(sub.subscription_end_date.is_some());
}

#[actix_web::test]
async fn upgrade_rejects_unknown_plan() {
    let store = seeded_store();
    let app = api!(store);
    let before = store.subscription(1).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/upgrade/user/1")
        .set_json(json!({ "plan": "Enterprise" }))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.subscription(1).unwrap(), before);
}

#[actix_web::test]
async fn upgrade_of_unknown_user_is_404_even_with_bad_plan() {
    let app = api!(seeded_store());

    for plan in ["Pro", "Enterprise"] {
        let req = test::TestRequest::post()
            .uri("/api/upgrade/user/404")
            .set_json(json!({ "plan": plan }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", plan);
    }
}

#[actix_web::test]
async fn data_consumes_quota_until_exhausted() {
    let store = seeded_store();
    let app = api!(store);

    let req = test::TestRequest::get().uri("/api/data/user/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "data": "Some API response data" }));

    let req = test::TestRequest::get().uri("/api/data/user/1").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let req = test::TestRequest::get().uri("/api/subscription/user/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["usedThisMonth"], 1000);
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["plan"], "Free");
}

#[actix_web::test]
async fn upgrade_restores_access_after_exhaustion() {
    let store = seeded_store();
    let app = api!(store);

    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/api/data/user/1").to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::post()
        .uri("/api/upgrade/user/1")
        .set_json(json!({ "plan": "Pro" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/data/user/1").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(store.subscription(1).unwrap().used_this_month, 1);
}

#[actix_web::test]
async fn subscription_view_of_unknown_user_is_404() {
    let app = api!(seeded_store());

    let req = test::TestRequest::get().uri("/api/subscription/user/2").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
