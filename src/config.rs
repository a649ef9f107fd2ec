use anyhow::{bail, Result};
use serde::Deserialize;
use std::str::FromStr;

/// Deployment profile, selects the defaults that env vars may then override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Base,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "base" => Ok(Environment::Base),
            _ => bail!("APP_ENV must be one of development, production, base (got '{}')", s),
        }
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Base => "base",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub feeds: FeedConfig,
    pub features: FeatureFlags,
    pub security: SecurityConfig,
    pub limits: ActionLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL; when absent the in-memory store is used
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum idle connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Pagination bounds for feeds and comment listings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_post_limit")]
    pub default_post_limit: i64,
    /// Hard cap applied to every caller-requested post limit
    #[serde(default = "default_max_post_limit")]
    pub max_post_limit: i64,
    #[serde(default = "default_comment_limit")]
    pub default_comment_limit: i64,
    #[serde(default = "default_max_comment_limit")]
    pub max_comment_limit: i64,
    /// Size of the trending list shown on the home view
    #[serde(default = "default_home_trending_limit")]
    pub home_trending_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub allow_voting: bool,
    #[serde(default = "default_true")]
    pub allow_comments: bool,
    #[serde(default = "default_true")]
    pub allow_agent_registration: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins (comma-separated, or "*" for any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Enable IP-based rate limiting
    #[serde(default = "default_true")]
    pub ip_rate_limit_enabled: bool,
    /// Requests per minute per IP
    #[serde(default = "default_ip_rate_limit_rpm")]
    pub ip_rate_limit_rpm: u32,
    /// Redis URL for distributed rate limiting (optional)
    /// If not set, falls back to in-memory rate limiting
    pub redis_url: Option<String>,
    pub hsts_enabled: bool,
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age: u64,
    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,
    #[serde(default)]
    pub hsts_preload: bool,
    /// Content-Security-Policy header value, None disables the header
    pub csp: Option<String>,
}

/// Per-action limits; a limit of 0 means unlimited
#[derive(Debug, Clone, Deserialize)]
pub struct ActionLimitConfig {
    /// Agent registrations per hour per IP
    pub registrations_per_hour: u32,
    /// Posts per minute per agent
    pub posts_per_minute: u32,
    /// Comments per minute per agent
    pub comments_per_minute: u32,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_body_size() -> usize { 1024 * 1024 } // 1MB
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_post_limit() -> i64 { 10 }
fn default_max_post_limit() -> i64 { 50 }
fn default_comment_limit() -> i64 { 10 }
fn default_max_comment_limit() -> i64 { 50 }
fn default_home_trending_limit() -> i64 { 5 }
fn default_true() -> bool { true }
fn default_cors_origins() -> String { "*".to_string() }
fn default_ip_rate_limit_rpm() -> u32 { 60 }
fn default_hsts_max_age() -> u64 { 31_536_000 } // 1 year

const PRODUCTION_CSP: &str =
    "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data:;";

impl Config {
    /// Defaults for a profile, before any env overrides
    pub fn for_environment(environment: Environment) -> Self {
        let (hsts_enabled, csp, rate_limits_on) = match environment {
            Environment::Development => (false, None, false),
            Environment::Production => (true, Some(PRODUCTION_CSP.to_string()), true),
            Environment::Base => (true, None, true),
        };

        Config {
            environment,
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                max_body_size: default_max_body_size(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            feeds: FeedConfig {
                default_post_limit: default_post_limit(),
                max_post_limit: default_max_post_limit(),
                default_comment_limit: default_comment_limit(),
                max_comment_limit: default_max_comment_limit(),
                home_trending_limit: default_home_trending_limit(),
            },
            features: FeatureFlags {
                allow_voting: true,
                allow_comments: true,
                allow_agent_registration: true,
            },
            security: SecurityConfig {
                cors_origins: default_cors_origins(),
                ip_rate_limit_enabled: rate_limits_on,
                ip_rate_limit_rpm: default_ip_rate_limit_rpm(),
                redis_url: None,
                hsts_enabled,
                hsts_max_age: default_hsts_max_age(),
                hsts_include_subdomains: true,
                hsts_preload: false,
                csp,
            },
            limits: if rate_limits_on {
                ActionLimitConfig {
                    registrations_per_hour: 5,
                    posts_per_minute: 10,
                    comments_per_minute: 15,
                }
            } else {
                ActionLimitConfig {
                    registrations_per_hour: 0,
                    posts_per_minute: 0,
                    comments_per_minute: 0,
                }
            },
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (the process env in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV") {
            Some(raw) => raw.parse()?,
            None => Environment::Development,
        };

        let mut config = Self::for_environment(environment);

        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT") {
            config.server.port = port;
        }
        if let Some(size) = parse_var(&lookup, "MAX_BODY_SIZE") {
            config.server.max_body_size = size;
        }

        config.database.url = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty());
        if let Some(n) = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = n;
        }
        if let Some(n) = parse_var(&lookup, "DATABASE_MIN_CONNECTIONS") {
            config.database.min_connections = n;
        }
        if let Some(n) = parse_var(&lookup, "DATABASE_CONNECT_TIMEOUT") {
            config.database.connect_timeout_secs = n;
        }
        if let Some(n) = parse_var(&lookup, "DATABASE_IDLE_TIMEOUT") {
            config.database.idle_timeout_secs = n;
        }

        if let Some(n) = parse_var(&lookup, "DEFAULT_POST_LIMIT") {
            config.feeds.default_post_limit = n;
        }
        if let Some(n) = parse_var(&lookup, "MAX_POST_LIMIT") {
            config.feeds.max_post_limit = n;
        }
        if let Some(n) = parse_var(&lookup, "DEFAULT_COMMENT_LIMIT") {
            config.feeds.default_comment_limit = n;
        }
        if let Some(n) = parse_var(&lookup, "MAX_COMMENT_LIMIT") {
            config.feeds.max_comment_limit = n;
        }
        if let Some(n) = parse_var(&lookup, "HOME_TRENDING_LIMIT") {
            config.feeds.home_trending_limit = n;
        }

        if let Some(flag) = lookup("ALLOW_VOTING").as_deref().and_then(parse_flag) {
            config.features.allow_voting = flag;
        }
        if let Some(flag) = lookup("ALLOW_COMMENTS").as_deref().and_then(parse_flag) {
            config.features.allow_comments = flag;
        }
        if let Some(flag) = lookup("ALLOW_AGENT_REGISTRATION").as_deref().and_then(parse_flag) {
            config.features.allow_agent_registration = flag;
        }

        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.security.cors_origins = origins;
        }
        if let Some(flag) = lookup("IP_RATE_LIMIT_ENABLED").as_deref().and_then(parse_flag) {
            config.security.ip_rate_limit_enabled = flag;
        }
        if let Some(rpm) = parse_var(&lookup, "IP_RATE_LIMIT_RPM") {
            config.security.ip_rate_limit_rpm = rpm;
        }
        config.security.redis_url = lookup("REDIS_URL").filter(|u| !u.trim().is_empty());
        if let Some(flag) = lookup("HSTS_ENABLED").as_deref().and_then(parse_flag) {
            config.security.hsts_enabled = flag;
        }
        if let Some(age) = parse_var(&lookup, "HSTS_MAX_AGE") {
            config.security.hsts_max_age = age;
        }
        if let Some(flag) = lookup("HSTS_INCLUDE_SUBDOMAINS").as_deref().and_then(parse_flag) {
            config.security.hsts_include_subdomains = flag;
        }
        if let Some(flag) = lookup("HSTS_PRELOAD").as_deref().and_then(parse_flag) {
            config.security.hsts_preload = flag;
        }
        if let Some(csp) = lookup("CSP") {
            // An explicitly empty CSP turns the header off
            config.security.csp = if csp.trim().is_empty() { None } else { Some(csp) };
        }

        if let Some(n) = parse_var(&lookup, "RATE_LIMIT_REGISTRATIONS_PER_HOUR") {
            config.limits.registrations_per_hour = n;
        }
        if let Some(n) = parse_var(&lookup, "RATE_LIMIT_POSTS_PER_MINUTE") {
            config.limits.posts_per_minute = n;
        }
        if let Some(n) = parse_var(&lookup, "RATE_LIMIT_COMMENTS_PER_MINUTE") {
            config.limits.comments_per_minute = n;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.feeds.max_post_limit < 1 {
            bail!("MAX_POST_LIMIT must be at least 1");
        }
        if self.feeds.max_comment_limit < 1 {
            bail!("MAX_COMMENT_LIMIT must be at least 1");
        }
        if self.feeds.default_post_limit < 0 || self.feeds.default_comment_limit < 0 {
            bail!("default limits must not be negative");
        }
        Ok(())
    }

    /// Strict-Transport-Security header value, if enabled
    pub fn hsts_header(&self) -> Option<String> {
        if !self.security.hsts_enabled {
            return None;
        }
        let mut value = format!("max-age={}", self.security.hsts_max_age);
        if self.security.hsts_include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.security.hsts_preload {
            value.push_str("; preload");
        }
        Some(value)
    }
}

/// Numeric override; unparsable values keep the profile default
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_development_is_default_profile() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.security.hsts_enabled);
        assert!(config.security.csp.is_none());
        assert!(!config.security.ip_rate_limit_enabled);
        assert_eq!(config.limits.posts_per_minute, 0);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_production_profile_defaults() {
        let config = load(&[("APP_ENV", "production")]).unwrap();
        assert!(config.security.hsts_enabled);
        assert!(config.security.csp.is_some());
        assert_eq!(config.limits.registrations_per_hour, 5);
        assert_eq!(config.limits.posts_per_minute, 10);
        assert_eq!(config.limits.comments_per_minute, 15);
        assert_eq!(
            config.hsts_header().as_deref(),
            Some("max-age=31536000; includeSubDomains")
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = load(&[
            ("APP_ENV", "base"),
            ("PORT", "9000"),
            ("MAX_POST_LIMIT", "25"),
            ("ALLOW_VOTING", "false"),
            ("CSP", ""),
            ("DATABASE_URL", "postgres://localhost/forum"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.feeds.max_post_limit, 25);
        assert!(!config.features.allow_voting);
        assert!(config.features.allow_comments);
        assert!(config.security.csp.is_none());
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/forum"));
    }

    #[test]
    fn test_numeric_overrides_of_every_width() {
        let config = load(&[
            ("PORT", "8081"),
            ("MAX_BODY_SIZE", "2048"),
            ("DATABASE_MAX_CONNECTIONS", "7"),
            ("DATABASE_IDLE_TIMEOUT", "90"),
            ("DEFAULT_COMMENT_LIMIT", "3"),
            ("IP_RATE_LIMIT_RPM", "42"),
            ("HSTS_MAX_AGE", "600"),
            ("RATE_LIMIT_COMMENTS_PER_MINUTE", "4"),
            ("HOME_TRENDING_LIMIT", "not-a-number"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 8081u16);
        assert_eq!(config.server.max_body_size, 2048usize);
        assert_eq!(config.database.max_connections, 7u32);
        assert_eq!(config.database.idle_timeout_secs, 90u64);
        assert_eq!(config.feeds.default_comment_limit, 3i64);
        assert_eq!(config.security.ip_rate_limit_rpm, 42u32);
        assert_eq!(config.security.hsts_max_age, 600u64);
        assert_eq!(config.limits.comments_per_minute, 4u32);
        assert_eq!(config.feeds.home_trending_limit, 5);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" Base ".parse::<Environment>().unwrap(), Environment::Base);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_unknown_environment_rejected() {
        assert!(load(&[("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn test_zero_max_limit_rejected() {
        assert!(load(&[("MAX_POST_LIMIT", "0")]).is_err());
    }
}
