//! # Configuration
//!
//! Application settings with built-in defaults, overlaid by a `.env` file
//! and the process environment. CLI flags are applied last by the binary.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::email::EmailConfig;

/// Runtime mode; decides how much error detail reaches clients
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Mode::Production
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host to bind to (default: "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub mode: Mode,

    /// sled directory; `None` keeps everything in memory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_days")]
    pub jwt_expires_in_days: i64,

    #[serde(default = "default_jwt_days")]
    pub jwt_cookie_expires_in_days: i64,

    /// SMTP settings; `None` captures mail in memory
    #[serde(skip)]
    pub email: Option<EmailConfig>,

    /// CORS allowed origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Requests one client IP may make to `/api` per window; 0 disables
    /// the limit
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_jwt_secret() -> String {
    "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string()
}

fn default_jwt_days() -> i64 {
    90
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_rate_limit_max() -> u32 {
    100
}

fn default_rate_limit_window_secs() -> u64 {
    60 * 60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: Mode::default(),
            database_path: None,
            jwt_secret: default_jwt_secret(),
            jwt_expires_in_days: default_jwt_days(),
            jwt_cookie_expires_in_days: default_jwt_days(),
            email: None,
            cors_origins: default_cors_origins(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid by `.env` and the environment
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid by whatever `lookup` returns for each variable.
    /// Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = parsed("HOST") {
            config.host = host;
        }
        if let Some(port) = parsed("PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(mode) = parsed("APP_MODE").and_then(|m| m.parse().ok()) {
            config.mode = mode;
        }
        if let Some(path) = parsed("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(secret) = parsed("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(days) = parsed("JWT_EXPIRES_IN_DAYS").and_then(|d| d.parse().ok()) {
            config.jwt_expires_in_days = days;
        }
        if let Some(days) = parsed("JWT_COOKIE_EXPIRES_IN_DAYS").and_then(|d| d.parse().ok()) {
            config.jwt_cookie_expires_in_days = days;
        }
        if let Some(origins) = parsed("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(max) = parsed("RATE_LIMIT_MAX").and_then(|m| m.parse().ok()) {
            config.rate_limit_max = max;
        }
        if let Some(secs) = parsed("RATE_LIMIT_WINDOW_SECS").and_then(|s| s.parse().ok()) {
            config.rate_limit_window_secs = secs;
        }

        if let Some(host) = parsed("EMAIL_HOST") {
            let defaults = EmailConfig::default();
            config.email = Some(EmailConfig {
                smtp_host: host,
                smtp_port: parsed("EMAIL_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.smtp_port),
                smtp_user: parsed("EMAIL_USERNAME").unwrap_or_default(),
                smtp_password: parsed("EMAIL_PASSWORD").unwrap_or_default(),
                from: parsed("EMAIL_FROM").unwrap_or(defaults.from),
            });
        }

        config
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
