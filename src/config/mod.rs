//! Configuration module for the folklore archive backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Deployment environment; controls how much internal detail errors expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Fixed-window rate limit settings for the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Maximum requests per client per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
    /// How often expired client records are swept
    pub cleanup_interval: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret for the ingestion endpoint. Unset means ingestion is refused.
    pub api_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    pub environment: Environment,
    pub rate_limit: RateLimitSettings,
    /// Upper bound on an ingestion request body
    pub max_body_bytes: usize,
    /// Take the client identity from `X-Forwarded-For`/`X-Real-IP`. Only safe
    /// behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

/// A configuration variable held a value that could not be used.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // An empty key is treated as no key at all.
        let api_key = env::var("FOLKLORE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let db_path = env::var("FOLKLORE_DB_PATH")
            .unwrap_or_else(|_| "./data/archive.sqlite".to_string())
            .into();

        let bind_addr = parse_var("FOLKLORE_BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)))?;

        let log_level = env::var("FOLKLORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("FOLKLORE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") | Err(_) => LogFormat::Pretty,
            Ok(other) => {
                return Err(ConfigError {
                    variable: "FOLKLORE_LOG_FORMAT",
                    message: format!("expected 'pretty' or 'json', got '{}'", other),
                })
            }
        };

        let environment = match env::var("FOLKLORE_ENV").as_deref() {
            Ok("development") => Environment::Development,
            Ok("production") | Err(_) => Environment::Production,
            Ok(other) => {
                return Err(ConfigError {
                    variable: "FOLKLORE_ENV",
                    message: format!("expected 'development' or 'production', got '{}'", other),
                })
            }
        };

        let defaults = RateLimitSettings::default();
        let max_requests = parse_var("FOLKLORE_RATE_LIMIT_MAX", defaults.max_requests)?;
        let window_secs = parse_var("FOLKLORE_RATE_LIMIT_WINDOW_SECS", defaults.window.as_secs())?;
        let cleanup_secs = parse_var(
            "FOLKLORE_RATE_LIMIT_CLEANUP_SECS",
            defaults.cleanup_interval.as_secs(),
        )?;

        if max_requests == 0 || window_secs == 0 || cleanup_secs == 0 {
            return Err(ConfigError {
                variable: "FOLKLORE_RATE_LIMIT_*",
                message: "rate limit values must be greater than zero".to_string(),
            });
        }

        let max_body_bytes = parse_var("FOLKLORE_MAX_BODY_BYTES", 2 * 1024 * 1024)?;
        let trust_proxy_headers = parse_var("FOLKLORE_TRUST_PROXY_HEADERS", false)?;

        Ok(Self {
            api_key,
            db_path,
            bind_addr,
            log_level,
            log_format,
            environment,
            rate_limit: RateLimitSettings {
                max_requests,
                window: Duration::from_secs(window_secs),
                cleanup_interval: Duration::from_secs(cleanup_secs),
            },
            max_body_bytes,
            trust_proxy_headers,
        })
    }

    /// Whether error responses may include internal details.
    pub fn expose_internal_errors(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Parse a variable, falling back to `default` when unset.
fn parse_var<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(variable) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError {
            variable,
            message: format!("'{}': {}", raw, e),
        }),
        Err(_) => Ok(default),
    }
}
