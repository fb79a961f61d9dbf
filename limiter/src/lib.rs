use std::sync::Arc;

use db::store::SubscriptionStore;
use middleware::metering::MeteringMiddleware;
use quota::QuotaEnforcer;
use rate::RateLimiter;

pub mod counter;
pub mod quota;
pub mod rate;

pub mod middleware {
    pub mod metering;
}

pub fn metering_middleware(
    rate_limiter: Arc<RateLimiter>,
    quota: Arc<QuotaEnforcer>,
    store: Arc<dyn SubscriptionStore>,
) -> MeteringMiddleware {
    MeteringMiddleware::new(rate_limiter, quota, store)
}
