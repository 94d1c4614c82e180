//! Process configuration.
//!
//! LIFECYCLE
//! =========
//! `Config` is built exactly once in `main`, before the pool or router exist,
//! then shared read-only through `AppState`. Changing a value requires a
//! restart; nothing re-reads the environment after startup.
//!
//! The CORS origin may come from `WEB_CLIENT_URL` or, when that is unset, from
//! the single row of the `backend_api_config` table (see `resolve_web_client_url`).

use sqlx::PgPool;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("backend_api_config has no rows; set WEB_CLIENT_URL or seed the table")]
    NoConfigRow,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Allowed CORS origin. `None` until resolved against the database.
    pub web_client_url: Option<String>,
    pub cookie_secure: bool,
    pub session_ttl_days: i64,
}

impl Config {
    /// Build configuration from process environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL` (alias `DB_CONNECTION_STRING`)
    ///
    /// Optional:
    /// - `PORT` (alias `NODEJS_LISTEN_PORT`): default 8080
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `WEB_CLIENT_URL`: CORS origin, falls back to `backend_api_config`
    /// - `COOKIE_SECURE`: default false
    /// - `SESSION_TTL_DAYS`: default 30
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("DB_CONNECTION_STRING"))
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match lookup("PORT").or_else(|| lookup("NODEJS_LISTEN_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };
        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => parse_value("DB_MAX_CONNECTIONS", &raw)?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };
        let session_ttl_days = match lookup("SESSION_TTL_DAYS") {
            Some(raw) => parse_value("SESSION_TTL_DAYS", &raw)?,
            None => DEFAULT_SESSION_TTL_DAYS,
        };
        if session_ttl_days <= 0 {
            return Err(ConfigError::Invalid { key: "SESSION_TTL_DAYS", value: session_ttl_days.to_string() });
        }
        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key: "COOKIE_SECURE", value: raw })?,
            None => false,
        };
        let web_client_url = lookup("WEB_CLIENT_URL")
            .map(|v| v.trim().trim_end_matches('/').to_owned())
            .filter(|v| !v.is_empty());

        Ok(Self { database_url, port, db_max_connections, web_client_url, cookie_secure, session_ttl_days })
    }

    /// Fill in `web_client_url` from `backend_api_config` if the environment
    /// did not provide it. Called once at startup, after migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the table is empty.
    pub async fn resolve_web_client_url(mut self, pool: &PgPool) -> Result<Self, ConfigError> {
        if self.web_client_url.is_some() {
            return Ok(self);
        }

        let url: Option<String> = sqlx::query_scalar("SELECT web_client_url FROM backend_api_config LIMIT 1")
            .fetch_optional(pool)
            .await?;
        let url = url.ok_or(ConfigError::NoConfigRow)?;
        tracing::info!(web_client_url = %url, "loaded web client url from backend_api_config");
        self.web_client_url = Some(url.trim_end_matches('/').to_owned());
        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value: raw.to_owned() })
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
