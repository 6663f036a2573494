use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// Fixed-window request counter per client IP, kept in redis.
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    fn client_ip(req: &Request<Body>) -> String {
        // 从连接信息获取原始IP
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        // 优先使用代理头中的IP
        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
            .or(remote_ip.as_deref()) // 降级使用连接IP
            .unwrap_or("unknown")
            .trim()
            .to_string()
    }

    /// Returns the request count in the current window, or `None` when redis is unavailable.
    async fn hit(&self, ip: &str) -> Option<u32> {
        let key = format!("rate_limit:{}", ip);
        let mut conn = match self.redis.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Rate limiter disabled for this request, redis unavailable: {}", e);
                return None;
            }
        };

        // 使用 Redis 的 INCR 和 EXPIRE 命令实现计数器
        let count: u32 = conn.incr(&key, 1).await.ok()?;
        if count == 1 {
            // 第一次请求时设置过期时间
            let window = self.config.rate_limit_window().as_secs() as i64;
            let _: Result<(), redis::RedisError> = conn.expire(&key, window).await;
        }
        Some(count)
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let ip = Self::client_ip(&req);

        if let Some(count) = self.hit(&ip).await {
            if count > self.config.rate_limit_requests {
                tracing::warn!("Rate limit exceeded for {}", ip);
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "Too many requests, retry in {} seconds",
                            self.config.rate_limit_window().as_secs()
                        ),
                    ),
                )
                    .into_response();
            }
        }

        next.run(req).await
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
