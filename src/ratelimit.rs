//! Rate limiting
//!
//! Supports two backends:
//! - In-memory: Uses a sliding window algorithm with HashMap storage (single instance)
//! - Redis: Uses Redis INCR/EXPIRE for distributed rate limiting (multi-instance)
//!
//! Configure via REDIS_URL environment variable to use Redis backend.
//!
//! One limiter guards every request by client IP (middleware). Per-action
//! limiters (registration per IP, posting and commenting per agent) share
//! the same backend under their own key scope and are checked in handlers.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{AppError, Result};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Rate limiter that supports both in-memory and Redis backends
#[derive(Clone)]
pub struct RateLimiter {
    inner: RateLimiterInner,
    /// Key namespace, keeps different limits apart on a shared backend
    scope: &'static str,
    /// Requests allowed per window; 0 means unlimited
    limit: u32,
    window: Duration,
    /// Whether rate limiting is enabled
    enabled: bool,
}

#[derive(Clone)]
enum RateLimiterInner {
    /// In-memory rate limiting (single instance only)
    Memory {
        requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    },
    /// Redis-backed rate limiting (distributed)
    Redis {
        conn: redis::aio::MultiplexedConnection,
    },
}

impl RateLimiter {
    /// Create a new in-memory rate limiter
    pub fn new_memory(scope: &'static str, limit: u32, window: Duration, enabled: bool) -> Self {
        Self {
            inner: RateLimiterInner::Memory {
                requests: Arc::new(RwLock::new(HashMap::new())),
            },
            scope,
            limit,
            window,
            enabled,
        }
    }

    /// Create a new Redis-backed rate limiter
    pub async fn new_redis(
        redis_url: &str,
        scope: &'static str,
        limit: u32,
        window: Duration,
        enabled: bool,
    ) -> std::result::Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            inner: RateLimiterInner::Redis { conn },
            scope,
            limit,
            window,
            enabled,
        })
    }

    /// Create the per-IP limiter from configuration
    /// Uses Redis if REDIS_URL is configured, otherwise falls back to in-memory
    pub async fn from_config(config: &Config) -> Self {
        let rpm = config.security.ip_rate_limit_rpm;
        let enabled = config.security.ip_rate_limit_enabled;

        if let Some(url) = config.security.redis_url.as_deref() {
            match tokio::time::timeout(
                Duration::from_secs(5),
                Self::new_redis(url, "ip", rpm, MINUTE, enabled),
            )
            .await
            {
                Ok(Ok(limiter)) => {
                    tracing::info!("Using Redis-backed rate limiting");
                    return limiter;
                }
                Ok(Err(e)) => {
                    tracing::warn!("Redis connection failed: {}. Falling back to in-memory.", e);
                }
                Err(_) => {
                    tracing::warn!("Redis connection timed out. Falling back to in-memory.");
                }
            }
        }
        tracing::info!("Using in-memory rate limiting (single instance only)");
        Self::new_memory("ip", rpm, MINUTE, enabled)
    }

    /// A limiter with its own scope and policy on the same backend
    pub fn with_policy(&self, scope: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            inner: self.inner.clone(),
            scope,
            limit,
            window,
            enabled: true,
        }
    }

    fn is_active(&self) -> bool {
        self.enabled && self.limit > 0
    }

    /// Check if a request is allowed and record it
    pub async fn check_and_record(&self, key: &str) -> bool {
        if !self.is_active() {
            return true;
        }

        let key = format!("ratelimit:{}:{}", self.scope, key);
        match &self.inner {
            RateLimiterInner::Memory { requests } => {
                self.check_and_record_memory(requests, key).await
            }
            RateLimiterInner::Redis { conn } => {
                self.check_and_record_redis(conn.clone(), &key).await
            }
        }
    }

    /// Like `check_and_record`, as an error for handlers
    pub async fn check(&self, key: &str) -> Result<()> {
        if self.check_and_record(key).await {
            Ok(())
        } else {
            tracing::debug!(scope = self.scope, key, "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }

    async fn check_and_record_memory(
        &self,
        requests: &Arc<RwLock<HashMap<String, Vec<Instant>>>>,
        key: String,
    ) -> bool {
        let now = Instant::now();

        let mut requests = requests.write().await;
        let timestamps = requests.entry(key).or_default();

        // Remove old timestamps outside the window
        timestamps.retain(|&t| now.duration_since(t) < self.window);

        if timestamps.len() >= self.limit as usize {
            return false;
        }

        timestamps.push(now);
        true
    }

    async fn check_and_record_redis(
        &self,
        mut conn: redis::aio::MultiplexedConnection,
        key: &str,
    ) -> bool {
        let result: std::result::Result<bool, redis::RedisError> = async {
            // Use pipeline to send INCR and EXPIRE in a single round-trip
            let mut pipe = redis::pipe();
            pipe.atomic()
                .cmd("INCR").arg(key)
                .cmd("EXPIRE").arg(key).arg(self.window.as_secs()).ignore();

            let (count,): (u32,) = pipe.query_async(&mut conn).await?;

            Ok(count <= self.limit)
        }
        .await;

        match result {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::error!("Redis rate limit check failed: {}. Allowing request.", e);
                // Fail open: allow requests if Redis is unavailable
                true
            }
        }
    }

    /// Cleanup old entries (only needed for in-memory backend)
    pub async fn cleanup(&self) {
        if let RateLimiterInner::Memory { requests } = &self.inner {
            let now = Instant::now();
            // Longest window any scope uses
            let horizon = HOUR + MINUTE;
            let mut requests = requests.write().await;

            requests.retain(|_, timestamps| {
                timestamps.retain(|&t| now.duration_since(t) < horizon);
                !timestamps.is_empty()
            });
        }
        // Redis handles expiry automatically
    }

    /// Check if using Redis backend
    pub fn is_redis(&self) -> bool {
        matches!(self.inner, RateLimiterInner::Redis { .. })
    }
}

/// Per-action limits checked inside handlers
#[derive(Clone)]
pub struct ActionLimiters {
    /// Keyed by client IP
    pub register: RateLimiter,
    /// Keyed by agent id
    pub post: RateLimiter,
    /// Keyed by agent id
    pub comment: RateLimiter,
}

impl ActionLimiters {
    pub fn new(base: &RateLimiter, config: &Config) -> Self {
        let limits = &config.limits;
        Self {
            register: base.with_policy("register", limits.registrations_per_hour, HOUR),
            post: base.with_policy("post", limits.posts_per_minute, MINUTE),
            comment: base.with_policy("comment", limits.comments_per_minute, MINUTE),
        }
    }
}

/// Best-effort client address: first X-Forwarded-For hop, then the socket peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

/// Resolve the client IP, checking X-Forwarded-For first (behind a proxy)
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or(peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limit middleware
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    // Skip rate limiting for health checks
    let path = request.uri().path();
    if path == "/health" || path == "/ready" {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(request.headers(), peer);

    if !limiter.check_and_record(&ip).await {
        let mut response = AppError::RateLimited.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(limiter.window.as_secs()));
        return response;
    }

    next.run(request).await
}

/// Start background cleanup task for rate limiter (only needed for memory backend)
pub fn start_cleanup_task(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MINUTE);
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_limiter_blocks_after_limit() {
        let limiter = RateLimiter::new_memory("test", 2, MINUTE, true);
        assert!(limiter.check_and_record("a").await);
        assert!(limiter.check_and_record("a").await);
        assert!(!limiter.check_and_record("a").await);
        // Other keys are independent
        assert!(limiter.check_and_record("b").await);
    }

    #[tokio::test]
    async fn test_zero_limit_or_disabled_is_unlimited() {
        let disabled = RateLimiter::new_memory("test", 1, MINUTE, false);
        let unlimited = RateLimiter::new_memory("test", 0, MINUTE, true);
        for _ in 0..10 {
            assert!(disabled.check_and_record("a").await);
            assert!(unlimited.check_and_record("a").await);
        }
    }

    #[tokio::test]
    async fn test_scopes_share_backend_but_not_counts() {
        let base = RateLimiter::new_memory("ip", 100, MINUTE, true);
        let post = base.with_policy("post", 1, MINUTE);
        let comment = base.with_policy("comment", 1, MINUTE);

        assert!(post.check("7").await.is_ok());
        assert!(matches!(post.check("7").await, Err(AppError::RateLimited)));
        assert!(comment.check("7").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let limiter = RateLimiter::new_memory("test", 1, Duration::from_millis(20), true);
        assert!(limiter.check_and_record("a").await);
        assert!(!limiter.check_and_record("a").await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check_and_record("a").await);
    }

    #[test]
    fn test_client_ip_resolution() {
        let mut headers = HeaderMap::new();
        let peer: Option<IpAddr> = "10.0.0.1".parse().ok();
        assert_eq!(client_ip(&headers, peer), "10.0.0.1");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer), "203.0.113.9");
    }
}
