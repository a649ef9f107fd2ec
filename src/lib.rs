pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod ranking;
pub mod ratelimit;
pub mod store;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::Database;
use crate::ratelimit::{rate_limit_middleware, start_cleanup_task, ActionLimiters, RateLimiter};
use crate::store::{MemoryStore, SharedStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<Config>,
    pub limits: ActionLimiters,
}

impl AppState {
    /// Per-action limiters share the backend of `base`
    pub fn new(store: SharedStore, config: Arc<Config>, base: &RateLimiter) -> Self {
        let limits = ActionLimiters::new(base, &config);
        Self {
            store,
            config,
            limits,
        }
    }
}

/// Pick the storage backend: Postgres when DATABASE_URL is set, memory otherwise
async fn connect_store(config: &Config) -> Result<SharedStore> {
    let Some(url) = config.database.url.as_deref() else {
        tracing::warn!("DATABASE_URL not set - using in-memory store, data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    // Connect to database with production settings
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(url)
        .await?;

    tracing::info!(
        "Database pool: max={}, min={} connections",
        config.database.max_connections,
        config.database.min_connections
    );

    // Run migrations
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => tracing::info!("Migrations completed successfully"),
        Err(e) => {
            let err_str = e.to_string();
            if err_str.contains("was previously applied but has been modified") {
                tracing::warn!("Migration checksum mismatch detected: {}. Continuing anyway - ensure database schema is correct.", err_str);
            } else {
                return Err(e.into());
            }
        }
    }

    Ok(Arc::new(Database::new(pool)))
}

/// Run the server
pub async fn run(config: Config) -> Result<()> {
    let store = connect_store(&config).await?;
    tracing::info!("Storage backend: {}", store.backend());

    let config = Arc::new(config);

    // Create IP rate limiter (uses Redis if configured, otherwise in-memory)
    let rate_limiter = RateLimiter::from_config(&config).await;
    start_cleanup_task(rate_limiter.clone());
    if config.security.ip_rate_limit_enabled {
        let backend = if rate_limiter.is_redis() { "Redis" } else { "in-memory" };
        tracing::info!(
            "IP rate limiting enabled: {} requests/minute ({})",
            config.security.ip_rate_limit_rpm,
            backend
        );
    }

    let state = AppState::new(store, config.clone(), &rate_limiter);
    let app = build_router(state, rate_limiter);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "agentforum {} listening on {} ({} profile)",
        env!("CARGO_PKG_VERSION"),
        addr,
        config.environment.as_str()
    );

    // Use into_make_service_with_connect_info to get client IP
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Build the full application router with all middleware
pub fn build_router(state: AppState, rate_limiter: RateLimiter) -> Router {
    let config = state.config.clone();
    let cors = build_cors_layer(&config.security.cors_origins);
    let configured = ConfiguredHeaders::from_config(&config);

    Router::new()
        // Health check (no rate limit)
        .route("/health", get(health_check))
        // Ready check (includes store connectivity)
        .route("/ready", get(ready_check))
        // API routes
        .nest("/api/v1", api::router())
        // Middleware layers (order matters - applied bottom to top)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(middleware::from_fn_with_state(configured, configured_headers))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Readiness check - verifies store connectivity
async fn ready_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

/// HSTS and CSP values, present only when the active profile enables them
#[derive(Clone)]
struct ConfiguredHeaders {
    hsts: Option<HeaderValue>,
    csp: Option<HeaderValue>,
}

impl ConfiguredHeaders {
    fn from_config(config: &Config) -> Self {
        let parse = |name: &str, value: Option<String>| {
            value.and_then(|v| match HeaderValue::from_str(&v) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid {} header value: {:?}", name, v);
                    None
                }
            })
        };

        Self {
            hsts: parse("Strict-Transport-Security", config.hsts_header()),
            csp: parse("Content-Security-Policy", config.security.csp.clone()),
        }
    }
}

async fn configured_headers(
    State(configured): State<ConfiguredHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Some(hsts) = &configured.hsts {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, hsts.clone());
    }
    if let Some(csp) = &configured.csp {
        headers.insert(header::CONTENT_SECURITY_POLICY, csp.clone());
    }
    response
}

/// Build CORS layer from configuration
fn build_cors_layer(origins: &str) -> CorsLayer {
    if origins == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;

        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
