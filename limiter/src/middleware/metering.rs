use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::error::AppError;
use db::store::SubscriptionStore;

use crate::{
    quota::{Consumption, QuotaEnforcer},
    rate::{Admission, RateLimiter},
};

/// Name of the path segment holding the metered user's id.
pub const USER_ID_PARAM: &str = "user_id";

// --- Metering Middleware Definition ---

/// Gates a scope whose path carries `{user_id}`.
///
/// Per request, in order: the user must exist, the rate limiter must admit
/// the request, then one unit of monthly quota is consumed. A request stopped
/// by the rate limiter never reaches the quota.
pub struct MeteringMiddleware {
    rate_limiter: Arc<RateLimiter>,
    quota: Arc<QuotaEnforcer>,
    store: Arc<dyn SubscriptionStore>,
}

impl MeteringMiddleware {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        quota: Arc<QuotaEnforcer>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            rate_limiter,
            quota,
            store,
        }
    }
}

// --- Middleware Transform Implementation ---

impl<S, B> Transform<S, ServiceRequest> for MeteringMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = MeteringMiddlewareService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(MeteringMiddlewareService {
            service: Rc::new(service),
            rate_limiter: self.rate_limiter.clone(),
            quota: self.quota.clone(),
            store: self.store.clone(),
        }))
    }
}

// --- Actual Middleware Service ---

pub struct MeteringMiddlewareService<S> {
    service: Rc<S>,
    rate_limiter: Arc<RateLimiter>,
    quota: Arc<QuotaEnforcer>,
    store: Arc<dyn SubscriptionStore>,
}

impl<S, B> Service<ServiceRequest> for MeteringMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let rate_limiter = self.rate_limiter.clone();
        let quota = self.quota.clone();
        let store = self.store.clone();

        Box::pin(async move {
            // 1. Resolve the user
            let user_id = match req
                .match_info()
                .get(USER_ID_PARAM)
                .and_then(|raw| raw.parse::<i64>().ok())
            {
                Some(id) => id,
                None => {
                    return Ok(req.error_response(AppError::NotFound(
                        "No such user".to_string(),
                    )));
                }
            };

            match store.get_user(user_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Ok(req.error_response(AppError::NotFound(format!(
                        "User {} not found",
                        user_id
                    ))));
                }
                Err(e) => return Ok(req.error_response(e)),
            }

            // 2. Request rate
            if rate_limiter.admit(user_id).await == Admission::Limited {
                return Ok(req.error_response(AppError::TooManyRequests(
                    "Rate limit exceeded. Please try again later.".to_string(),
                )));
            }

            // 3. Monthly quota
            match quota.try_consume(user_id).await {
                Ok(Consumption::Consumed) => {}
                Ok(Consumption::QuotaExceeded) => {
                    return Ok(req.error_response(AppError::TooManyRequests(
                        "Monthly quota exceeded".to_string(),
                    )));
                }
                Ok(Consumption::NotFound) => {
                    return Ok(req.error_response(AppError::NotFound(format!(
                        "No subscription for user {}",
                        user_id
                    ))));
                }
                Err(e) => return Ok(req.error_response(e)),
            }

            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}
