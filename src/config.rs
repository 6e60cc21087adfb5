use std::env;

use thiserror::Error;

/// Fallback signing secret for local development only.
pub const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// Session lifetime used when `TOKEN_TTL_HOURS` is not set.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Longest accepted session lifetime (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// AppConfig
///
/// Holds the application's entire configuration state. It is immutable once loaded
/// and pulled into handlers and extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // Postgres connection string. `None` runs the service on the in-memory store.
    pub db_url: Option<String>,
    // Symmetric secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token, in hours.
    pub token_ttl_hours: i64,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context: developer-friendly defaults locally, strict
/// configuration in production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Failures while resolving configuration from the environment.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe values for test state setup, no environment access.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables. Production refuses to start
    /// without an explicit `DATABASE_URL` and `JWT_SECRET`; local runs fall back to
    /// the development secret and the in-memory store.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = non_empty_var("DATABASE_URL");
        let jwt_secret = non_empty_var("JWT_SECRET");

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(db_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?,
            ),
            Env::Local => (
                db_url,
                jwt_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let token_ttl_hours = match non_empty_var("TOKEN_TTL_HOURS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(hours) if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) => hours,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TOKEN_TTL_HOURS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_TOKEN_TTL_HOURS,
        };

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            token_ttl_hours,
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    /// Token lifetime as a `chrono::Duration`.
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
