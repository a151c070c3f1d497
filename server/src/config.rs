use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use platform_db::{ConnectionParts, DatabaseSettings, TableName};
use url::Url;

/// Settings read once at start-up and never changed afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub table: TableName,
    pub gateway_url: Option<Url>,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.into());

        let database = match var("DATABASE_URL") {
            Some(url) => DatabaseSettings::new(url),
            None => {
                let defaults = ConnectionParts::default();
                let port = match var("DB_PORT") {
                    Some(raw) => parse_number(&raw, "DB_PORT")?,
                    None => defaults.port,
                };
                let parts = ConnectionParts {
                    host: or_default("DB_HOST", &defaults.host),
                    port,
                    user: or_default("DB_USER", &defaults.user),
                    password: or_default("DB_PASSWORD", &defaults.password),
                    database: or_default("DB_NAME", &defaults.database),
                    ssl_mode: or_default("DB_SSL_MODE", &defaults.ssl_mode),
                };
                DatabaseSettings::from_parts(&parts).context("invalid database settings")?
            }
        };
        let max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(raw) => parse_number(&raw, "DB_MAX_CONNECTIONS")?,
            None => database.max_connections,
        };
        let acquire_timeout = match var("DB_ACQUIRE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number(&raw, "DB_ACQUIRE_TIMEOUT_SECS")?),
            None => database.acquire_timeout,
        };
        let database = database.with_pool_limits(max_connections, acquire_timeout);

        let table = match var("DB_TABLE") {
            Some(raw) => TableName::parse(raw.trim()).context("invalid DB_TABLE")?,
            None => TableName::default(),
        };

        let gateway_url = var("AUTH_API")
            .map(|raw| Url::parse(raw.trim()))
            .transpose()
            .context("invalid AUTH_API url")?;

        let cookie_secure = var("COOKIE_SECURE")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database,
            table,
            gateway_url,
            cookie_secure,
        })
    }

    pub fn require_gateway(&self) -> Result<&Url> {
        self.gateway_url
            .as_ref()
            .ok_or_else(|| anyhow!("AUTH_API must be set to serve requests"))
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("{key} must be a number, got {raw:?}"))
}
