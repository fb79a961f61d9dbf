use actix_web::{HttpResponse, http::header};
use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

/// Seconds a client is told to wait before retrying after a store outage.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    RedisPool(String),

    // === APPLICATION ERRORS ===
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid plan '{0}'. Must be 'Free' or 'Pro'.")]
    InvalidPlan(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Redis(_)
                | AppError::RedisPool(_)
                | AppError::StoreUnavailable(_)
        )
    }

    pub fn to_http_response(&self) -> HttpResponse {
        let is_dev = cfg!(debug_assertions);

        let to_unavailable_json = |err_msg: &str| {
            if is_dev {
                serde_json::json!({ "error": err_msg, "retryable": true })
            } else {
                serde_json::json!({ "error": "Service temporarily unavailable", "retryable": true })
            }
        };

        match self {
            // === CONVERSION ERRORS ===
            AppError::Database(error) => {
                log::error!("Database error: {}", error);
                HttpResponse::ServiceUnavailable()
                    .insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS))
                    .json(to_unavailable_json(&error.to_string()))
            }
            AppError::Redis(error) => {
                log::error!("Redis error: {}", error);
                HttpResponse::ServiceUnavailable()
                    .insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS))
                    .json(to_unavailable_json(&error.to_string()))
            }
            AppError::RedisPool(error) => {
                log::error!("Redis pool error: {}", error);
                HttpResponse::ServiceUnavailable()
                    .insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS))
                    .json(to_unavailable_json(error))
            }

            // === APPLICATION ERRORS ===
            AppError::NotFound(_) => {
                HttpResponse::NotFound().json(serde_json::json!({ "error": self.to_string() }))
            }
            AppError::InvalidPlan(_) | AppError::BadRequest(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": self.to_string() }))
            }
            AppError::TooManyRequests(_) => HttpResponse::TooManyRequests()
                .json(serde_json::json!({ "error": self.to_string() })),

            AppError::StoreUnavailable(error) => {
                log::error!("Store unavailable: {}", error);
                HttpResponse::ServiceUnavailable()
                    .insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS))
                    .json(to_unavailable_json(error))
            }
            AppError::Internal(error) => {
                log::error!("Internal error: {}", error);
                let body = if is_dev {
                    serde_json::json!({ "error": error })
                } else {
                    serde_json::json!({ "error": "Internal server error" })
                };
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.to_http_response().status()
    }

    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;

    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (AppError::NotFound("user 1".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidPlan("Enterprise".into()), StatusCode::BAD_REQUEST),
            (AppError::TooManyRequests("slow down".into()), StatusCode::TOO_MANY_REQUESTS),
            (AppError::StoreUnavailable("timeout".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.to_http_response().status(), status, "{}", error);
        }
    }

    #[test]
    fn store_failures_are_retryable() {
        let unavailable = AppError::StoreUnavailable("timeout".into());
        assert!(unavailable.is_retryable());
        assert!(
            unavailable
                .to_http_response()
                .headers()
                .contains_key(header::RETRY_AFTER)
        );
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::NotFound("user 1".into()).is_retryable());
        assert!(!AppError::TooManyRequests("slow down".into()).is_retryable());
    }
}
