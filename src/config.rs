use anyhow::Context;
use serde::Deserialize;
use time::Duration;

const MAX_ACCESS_TTL_MINUTES: i64 = 60 * 24 * 365;
const MAX_REFRESH_TTL_DAYS: i64 = 365 * 10;

/// Positive TTL from `key`, `default` when unset or unparsable, an error when
/// above `max`.
fn ttl_var(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: i64,
    max: i64,
) -> anyhow::Result<i64> {
    let value = var(key)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default);
    if value > max {
        anyhow::bail!("{key} must be at most {max}, got {value}");
    }
    Ok(value)
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_ttl_days)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub platform: String,
    pub fileserver_root: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ttl_minutes: ttl_var(&var, "ACCESS_TOKEN_TTL_MINUTES", 60, MAX_ACCESS_TTL_MINUTES)?,
            refresh_ttl_days: ttl_var(&var, "REFRESH_TOKEN_TTL_DAYS", 60, MAX_REFRESH_TTL_DAYS)?,
        };
        if jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        Ok(Self {
            database_url,
            jwt,
            platform: var("PLATFORM").unwrap_or_else(|| "prod".into()),
            fileserver_root: var("FILESERVER_ROOT").unwrap_or_else(|| ".".into()),
        })
    }

    /// Destructive admin endpoints are only served in the dev environment.
    pub fn is_dev(&self) -> bool {
        self.platform == "dev"
    }
}
