mod cors;
mod redis;
mod schedule;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    middleware::Condition,
    web::{self},
};
use api_subs::services::{notify::LogNotifier, sub::PlanManager, sweep::Reconciler};
use common::env_config::Config;
use db::store::{PgSubscriptionStore, SubscriptionStore};
use limiter::{counter::CounterStore, quota::QuotaEnforcer, rate::RateLimiter};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();

    // get info
    let origin = config.cors_allowed_origin.clone();
    let console_logging = config.console_logging_enabled;

    // init logger
    if console_logging {
        logger::setup(&config.log_file).expect("Failed to set up logger");
    }

    // init subscription store
    let pool = db::setup(
        &config.database_url,
        config.is_production(),
        config.subscription_store_timeout,
    )
    .await
    .expect("Failed to set up database");
    let store: Arc<dyn SubscriptionStore> = Arc::new(PgSubscriptionStore::new(
        pool,
        config.subscription_store_timeout,
    ));

    // init counter store
    let counters: Arc<dyn CounterStore> = Arc::new(
        redis::setup_counter_store(&config).expect("Failed to create pool of Redis connections"),
    );

    // core components
    let rate_limiter = Arc::new(RateLimiter::new(counters, config.rate_limit.clone()));
    let quota = Arc::new(QuotaEnforcer::new(store.clone()));
    let plans = web::Data::new(PlanManager::new(store.clone()));
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(LogNotifier),
        config.sweep.reminder_days,
    ));

    // daily sweep
    schedule::spawn_daily_sweep(reconciler, config.sweep.hour_utc);

    log::info!(
        "Metered API listening on {}:{} ({} requests per {}s window)",
        config.server_host,
        config.server_port,
        config.rate_limit.max_requests,
        config.rate_limit.window.as_secs()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(plans.clone())
            .wrap(Condition::new(console_logging, logger::middleware())) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_subs::mount_data().wrap(limiter::metering_middleware(
                        rate_limiter.clone(),
                        quota.clone(),
                        store.clone(),
                    )))
                    .service(api_subs::mount_upgrade())
                    .service(api_subs::mount_subs()),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
