use std::{env, str::FromStr, sync::Arc, time::Duration};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds everything needed to start the metered API:
/// store connection details, server bind options, logging preferences,
/// throttling parameters and the schedule of the daily subscription sweep.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the subscription database to connect to.
    pub database_url: String,
    /// The URL of the Redis server holding the rate window counters.
    pub redis_url: String,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Path of the log file written next to the console output.
    pub log_file: String,
    /// Request-rate limiter settings.
    pub rate_limit: RateLimitConfig,
    /// Upper bound on a single Subscription Store call.
    pub subscription_store_timeout: Duration,
    /// Daily sweep settings.
    pub sweep: SweepConfig,
}

#[derive(Clone, Debug)]
/// Configuration of the fixed-window request-rate limiter.
pub struct RateLimitConfig {
    /// Requests admitted per user within one window.
    pub max_requests: i64,
    /// Window length. Also the TTL of every window counter.
    pub window: Duration,
    /// Upper bound on a single Counter Store call.
    pub store_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_requests: 100,
            window: Duration::from_secs(60),
            store_timeout: Duration::from_millis(250),
        }
    }
}

impl RateLimitConfig {
    /// Reads the limiter configuration from environment variables:
    /// - `RATE_LIMIT_MAX_REQUESTS` (default 100)
    /// - `RATE_LIMIT_WINDOW_SECS` (default 60)
    /// - `COUNTER_STORE_TIMEOUT_MS` (default 250)
    pub fn from_env() -> Self {
        let defaults = RateLimitConfig::default();
        RateLimitConfig {
            max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests),
            window: Duration::from_secs(
                parse_var("RATE_LIMIT_WINDOW_SECS", defaults.window.as_secs()).max(1),
            ),
            store_timeout: Duration::from_millis(parse_var(
                "COUNTER_STORE_TIMEOUT_MS",
                defaults.store_timeout.as_millis() as u64,
            )),
        }
    }
}

#[derive(Clone, Debug)]
/// Configuration of the daily subscription sweep.
pub struct SweepConfig {
    /// Hour of the day (UTC) at which the sweep fires.
    pub hour_utc: u32,
    /// Subscriptions ending within this many days get a renewal reminder.
    pub reminder_days: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            hour_utc: 2,
            reminder_days: 5,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the subscription database
    /// - `REDIS_URL`: Connection string for the counter store
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `LOG_FILE`: Log file path (default: "metered-api.log")
    /// - `SUBSCRIPTION_STORE_TIMEOUT_MS`: Subscription Store call bound (default: 2000)
    /// - `SWEEP_HOUR_UTC`: Hour the daily sweep runs at (default: 2)
    /// - `REMINDER_DAYS`: Renewal reminder horizon (default: 5)
    /// - Rate limiter settings, see [`RateLimitConfig::from_env`]
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing.
    /// Numeric values that cannot be parsed fall back to their defaults.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        let sweep_defaults = SweepConfig::default();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("PORT", 8080),
            num_workers: parse_var("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "metered-api.log".to_string()),
            rate_limit: RateLimitConfig::from_env(),
            subscription_store_timeout: Duration::from_millis(parse_var(
                "SUBSCRIPTION_STORE_TIMEOUT_MS",
                2000,
            )),
            sweep: SweepConfig {
                hour_utc: parse_var("SWEEP_HOUR_UTC", sweep_defaults.hour_utc).min(23),
                reminder_days: parse_var("REMINDER_DAYS", sweep_defaults.reminder_days),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_defaults_match_fixed_window_contract() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 100);
        assert_eq!(config.window, Duration::from_secs(60));
    }

    #[test]
    fn unset_store_timeout_uses_limiter_default() {
        if env::var("COUNTER_STORE_TIMEOUT_MS").is_ok() {
            return;
        }
        assert_eq!(
            RateLimitConfig::from_env().store_timeout,
            RateLimitConfig::default().store_timeout
        );
    }

    #[test]
    fn unparsable_values_fall_back_to_default() {
        assert_eq!(parse_var("METERED_API_TEST_UNSET_VARIABLE", 42u32), 42);
    }
}
