//! API Configuration Module
//!
//! Server, CORS, compiler and lifecycle settings. Configuration is loaded from
//! `SCHEMAGATE_*` environment variables with development-friendly defaults.

use schemagate_compiler::{CompilerOptions, DEFAULT_LIMIT, MAX_LIMIT};
use schemagate_core::DEFAULT_TENANT_COLUMN;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Catalog and compiler
    // ========================================================================
    /// Schema introspected for the catalog.
    pub db_schema: String,
    pub tenant_column: String,
    pub default_limit: u32,
    pub max_limit: u32,

    // ========================================================================
    // Execution
    // ========================================================================
    /// Deadline for lifecycle runs that do not set `timeoutMs`.
    pub lifecycle_timeout: Option<Duration>,
    pub idempotency_ttl: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            db_schema: "public".to_string(),
            tenant_column: DEFAULT_TENANT_COLUMN.to_string(),
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            lifecycle_timeout: Some(Duration::from_secs(120)),
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SCHEMAGATE_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` / `SCHEMAGATE_API_PORT`: Listen port (default: 3000)
    /// - `SCHEMAGATE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `SCHEMAGATE_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `SCHEMAGATE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `SCHEMAGATE_DB_SCHEMA`: Introspected schema (default: public)
    /// - `SCHEMAGATE_TENANT_COLUMN`: Tenant column name (default: biz_id)
    /// - `SCHEMAGATE_DEFAULT_LIMIT` / `SCHEMAGATE_MAX_LIMIT`: Query limits (default: 100 / 1000)
    /// - `SCHEMAGATE_LIFECYCLE_TIMEOUT_MS`: Default run deadline, 0 disables (default: 120000)
    /// - `SCHEMAGATE_IDEMPOTENCY_TTL_SECS`: Replay window (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("SCHEMAGATE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("SCHEMAGATE_CORS_ALLOW_CREDENTIALS")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let lifecycle_timeout = match env_parse::<u64>("SCHEMAGATE_LIFECYCLE_TIMEOUT_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.lifecycle_timeout,
        };

        Self {
            bind_host: std::env::var("SCHEMAGATE_API_BIND").unwrap_or(defaults.bind_host),
            port: env_parse("PORT")
                .or_else(|| env_parse("SCHEMAGATE_API_PORT"))
                .unwrap_or(defaults.port),
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs: env_parse("SCHEMAGATE_CORS_MAX_AGE_SECS").unwrap_or(defaults.cors_max_age_secs),
            db_schema: std::env::var("SCHEMAGATE_DB_SCHEMA").unwrap_or(defaults.db_schema),
            tenant_column: std::env::var("SCHEMAGATE_TENANT_COLUMN").unwrap_or(defaults.tenant_column),
            default_limit: env_parse("SCHEMAGATE_DEFAULT_LIMIT").unwrap_or(defaults.default_limit),
            max_limit: env_parse("SCHEMAGATE_MAX_LIMIT").unwrap_or(defaults.max_limit),
            lifecycle_timeout,
            idempotency_ttl: env_parse("SCHEMAGATE_IDEMPOTENCY_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idempotency_ttl),
        }
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            default_limit: self.default_limit.min(self.max_limit),
            max_limit: self.max_limit,
        }
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}
