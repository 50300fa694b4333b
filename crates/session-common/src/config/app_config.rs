//! Application configuration structs
//!
//! Loads configuration from environment variables (and an optional `.env` file).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::checked_lifetime;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub mail: MailConfig,
    pub password_reset: PasswordResetConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Grace period for in-flight work (mail dispatch) on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
}

/// JWT configuration
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[redacted]")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish()
    }
}

/// Rate limiting configuration
///
/// `capacity` / `refill_per_second` drive the per-client bucket; the `global_*`
/// pair drives the process-wide flood guard.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_capacity")]
    pub capacity: f64,
    #[serde(default = "default_refill_per_second")]
    pub refill_per_second: f64,
    #[serde(default = "default_global_per_second")]
    pub global_per_second: u64,
    #[serde(default = "default_global_burst")]
    pub global_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_rate_capacity(),
            refill_per_second: default_refill_per_second(),
            global_per_second: default_global_per_second(),
            global_burst: default_global_burst(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Outbound mail configuration
#[derive(Clone, Deserialize)]
pub struct MailConfig {
    pub from: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_mail_send_timeout")]
    pub send_timeout_secs: u64,
}

impl MailConfig {
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: None,
            host: None,
            port: None,
            username: None,
            password: None,
            send_timeout_secs: default_mail_send_timeout(),
        }
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("from", &self.from)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("send_timeout_secs", &self.send_timeout_secs)
            .finish()
    }
}

/// Password reset link configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfig {
    #[serde(default = "default_frontend_domain")]
    pub frontend_domain: String,
    #[serde(default = "default_reset_path")]
    pub reset_path: String,
    #[serde(default = "default_reset_token_ttl")]
    pub token_ttl_secs: i64,
}

impl PasswordResetConfig {
    /// Build the link mailed to the user for a raw reset token
    #[must_use]
    pub fn reset_link(&self, raw_token: &str) -> String {
        format!("{}{}?token={raw_token}", self.frontend_domain, self.reset_path)
    }

    /// Link lifetime, or `None` when `token_ttl_secs` is out of range
    #[must_use]
    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        checked_lifetime(self.token_ttl_secs)
    }
}

impl Default for PasswordResetConfig {
    fn default() -> Self {
        Self {
            frontend_domain: default_frontend_domain(),
            reset_path: default_reset_path(),
            token_ttl_secs: default_reset_token_ttl(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "session-server".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_migrations_dir() -> String {
    "./migrations".to_string()
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

fn default_refresh_token_expiry() -> i64 {
    604_800 // 7 days
}

fn default_rate_capacity() -> f64 {
    10.0
}

fn default_refill_per_second() -> f64 {
    0.4
}

fn default_global_per_second() -> u64 {
    100
}

fn default_global_burst() -> u32 {
    200
}

fn default_mail_send_timeout() -> u64 {
    15
}

fn default_frontend_domain() -> String {
    "http://localhost:3000".to_string()
}

fn default_reset_path() -> String {
    "/reset-password".to_string()
}

fn default_reset_token_ttl() -> i64 {
    900 // 15 minutes
}

/// Read an optional variable, falling back to `default` when unset
fn var_or<T: FromStr>(name: &'static str, default: impl FnOnce() -> T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        _ => Ok(default()),
    }
}

/// Read a required variable
fn required_var<T: FromStr>(name: &'static str) -> Result<T, ConfigError> {
    let raw = env::var(name).map_err(|_| ConfigError::MissingVar(name))?;
    if raw.trim().is_empty() {
        return Err(ConfigError::MissingVar(name));
    }
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name, raw))
}

fn optional_var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: match env::var("APP_ENV") {
                    Ok(raw) => raw
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("APP_ENV", raw))?,
                    Err(_) => default_env(),
                },
            },
            server: ServerConfig {
                host: env::var("APP_HOST").unwrap_or_else(|_| default_host()),
                port: required_var("APP_PORT")?,
                shutdown_timeout_secs: var_or("SHUTDOWN_TIMEOUT_SECS", default_shutdown_timeout)?,
                request_timeout_secs: var_or("REQUEST_TIMEOUT_SECS", default_request_timeout)?,
            },
            database: DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", default_max_connections)?,
                min_connections: var_or("DATABASE_MIN_CONNECTIONS", default_min_connections)?,
                run_migrations: var_or("DATABASE_RUN_MIGRATIONS", default_true)?,
                migrations_dir: env::var("DATABASE_MIGRATIONS_DIR")
                    .unwrap_or_else(|_| default_migrations_dir()),
            },
            jwt: JwtConfig {
                secret: required_var("JWT_SECRET")?,
                access_token_expiry: var_or("JWT_ACCESS_TOKEN_EXPIRY", default_access_token_expiry)?,
                refresh_token_expiry: var_or(
                    "JWT_REFRESH_TOKEN_EXPIRY",
                    default_refresh_token_expiry,
                )?,
            },
            rate_limit: RateLimitConfig {
                capacity: var_or("RATE_LIMIT_CAPACITY", default_rate_capacity)?,
                refill_per_second: var_or("RATE_LIMIT_REFILL_PER_SECOND", default_refill_per_second)?,
                global_per_second: var_or("RATE_LIMIT_GLOBAL_PER_SECOND", default_global_per_second)?,
                global_burst: var_or("RATE_LIMIT_GLOBAL_BURST", default_global_burst)?,
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .ok()
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|o| !o.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            mail: MailConfig {
                from: optional_var("MAIL_FROM"),
                host: optional_var("MAIL_HOST"),
                port: optional_var("MAIL_PORT")
                    .map(|raw| {
                        raw.parse()
                            .map_err(|_| ConfigError::InvalidValue("MAIL_PORT", raw))
                    })
                    .transpose()?,
                username: optional_var("MAIL_USERNAME"),
                password: optional_var("MAIL_PASSWORD"),
                send_timeout_secs: var_or("MAIL_SEND_TIMEOUT_SECS", default_mail_send_timeout)?,
            },
            password_reset: PasswordResetConfig {
                frontend_domain: env::var("FRONTEND_DOMAIN")
                    .unwrap_or_else(|_| default_frontend_domain()),
                reset_path: env::var("RESET_PATH").unwrap_or_else(|_| default_reset_path()),
                token_ttl_secs: var_or("RESET_TOKEN_TTL_SECS", default_reset_token_ttl)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Defaults for everything except the database URL and signing secret
    ///
    /// Binds to `127.0.0.1` on an ephemeral port; used by tests and local tooling.
    #[must_use]
    pub fn local(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                shutdown_timeout_secs: default_shutdown_timeout(),
                request_timeout_secs: default_request_timeout(),
            },
            database: DatabaseConfig {
                url: database_url.into(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                run_migrations: default_true(),
                migrations_dir: default_migrations_dir(),
            },
            jwt: JwtConfig {
                secret: jwt_secret.into(),
                access_token_expiry: default_access_token_expiry(),
                refresh_token_expiry: default_refresh_token_expiry(),
            },
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            mail: MailConfig::default(),
            password_reset: PasswordResetConfig::default(),
        }
    }

    /// Check cross-field constraints that parsing alone cannot express
    ///
    /// # Errors
    /// Returns the first offending variable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if checked_lifetime(self.jwt.access_token_expiry).is_none() {
            return Err(ConfigError::InvalidValue(
                "JWT_ACCESS_TOKEN_EXPIRY",
                self.jwt.access_token_expiry.to_string(),
            ));
        }
        if checked_lifetime(self.jwt.refresh_token_expiry).is_none()
            || self.jwt.refresh_token_expiry <= self.jwt.access_token_expiry
        {
            return Err(ConfigError::InvalidValue(
                "JWT_REFRESH_TOKEN_EXPIRY",
                self.jwt.refresh_token_expiry.to_string(),
            ));
        }
        if !(self.rate_limit.capacity >= 1.0) {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_CAPACITY",
                self.rate_limit.capacity.to_string(),
            ));
        }
        if !(self.rate_limit.refill_per_second > 0.0) {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_REFILL_PER_SECOND",
                self.rate_limit.refill_per_second.to_string(),
            ));
        }
        if self.rate_limit.global_per_second == 0 || self.rate_limit.global_burst == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_GLOBAL_PER_SECOND",
                self.rate_limit.global_per_second.to_string(),
            ));
        }
        if self.password_reset.token_ttl().is_none() {
            return Err(ConfigError::InvalidValue(
                "RESET_TOKEN_TTL_SECS",
                self.password_reset.token_ttl_secs.to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
