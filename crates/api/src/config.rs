use std::path::PathBuf;
use std::time::Duration;

use hostbook_core::access_code::DEFAULT_CODE_LENGTH;
use hostbook_core::autosave::{AutosaveConfig, DEFAULT_LIST_DEBOUNCE, DEFAULT_PROSE_DEBOUNCE};
use hostbook_core::media::DEFAULT_MAX_DIMENSION;
use hostbook_core::retry::RetryPolicy;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining editor sessions at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// PostgreSQL URL. Without one the service runs on the in-memory store.
    pub database_url: Option<String>,
    /// Length of issued access codes (default: `6`).
    pub pin_length: usize,
    pub autosave: AutosaveConfig,
    /// Editor sessions untouched this long are flushed and closed (default: `1800`).
    pub session_idle_ttl_secs: u64,
    /// Directory uploaded gallery images are written to (default: `./media`).
    pub media_dir: PathBuf,
    /// Longest side an uploaded image may keep (default: `1920`).
    pub media_max_dimension: u32,
}

pub(crate) fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `HOST`                       | `0.0.0.0`                  |
    /// | `PORT`                       | `3000`                     |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                       |
    /// | `DATABASE_URL`               | unset (in-memory store)    |
    /// | `PIN_LENGTH`                 | `6`                        |
    /// | `AUTOSAVE_PROSE_DEBOUNCE_MS` | `1000`                     |
    /// | `AUTOSAVE_LIST_DEBOUNCE_MS`  | `500`                      |
    /// | `AUTOSAVE_MAX_ATTEMPTS`      | `3`                        |
    /// | `AUTOSAVE_BACKOFF_MS`        | `500`                      |
    /// | `SESSION_IDLE_TTL_SECS`      | `1800`                     |
    /// | `MEDIA_DIR`                  | `./media`                  |
    /// | `MEDIA_MAX_DIMENSION`        | `1920`                     |
    ///
    /// # Panics
    ///
    /// Panics on malformed values and when `JWT_SECRET` is missing.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", 30);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let defaults = RetryPolicy::default();
        let autosave = AutosaveConfig {
            prose_debounce: Duration::from_millis(env_or(
                "AUTOSAVE_PROSE_DEBOUNCE_MS",
                DEFAULT_PROSE_DEBOUNCE.as_millis() as u64,
            )),
            list_debounce: Duration::from_millis(env_or(
                "AUTOSAVE_LIST_DEBOUNCE_MS",
                DEFAULT_LIST_DEBOUNCE.as_millis() as u64,
            )),
            retry: RetryPolicy {
                max_attempts: env_or("AUTOSAVE_MAX_ATTEMPTS", defaults.max_attempts),
                initial_delay: Duration::from_millis(env_or(
                    "AUTOSAVE_BACKOFF_MS",
                    defaults.initial_delay.as_millis() as u64,
                )),
                ..defaults
            },
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            database_url,
            pin_length: env_or("PIN_LENGTH", DEFAULT_CODE_LENGTH),
            autosave,
            session_idle_ttl_secs: env_or("SESSION_IDLE_TTL_SECS", 1800),
            media_dir: PathBuf::from(
                std::env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".into()),
            ),
            media_max_dimension: env_or("MEDIA_MAX_DIMENSION", DEFAULT_MAX_DIMENSION),
        }
    }
}
