use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;
use std::sync::Arc;

pub mod cleanup;
pub mod config;
pub mod error;
pub mod middleware;
pub mod permissions;
pub mod router;
pub mod routes;
pub mod seed;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
}
