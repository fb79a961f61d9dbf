use common::{
    env_config::Config,
    error::{AppError, Res},
};
use limiter::counter::RedisCounterStore;

/// Builds the counter store pool. No connection is opened here, so start-up
/// does not depend on Redis being reachable.
pub fn setup_counter_store(config: &Config) -> Res<RedisCounterStore> {
    let cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let pool = cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| AppError::RedisPool(format!("Failed to create Redis pool: {}", e)))?;
    Ok(RedisCounterStore::new(pool))
}
