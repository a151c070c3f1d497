//! Database primitives: pool settings, the validated table identifier and the
//! employee record store.

mod database;
mod employees;

use std::{fmt, str::FromStr, time::Duration};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, sea_query::Alias};
use thiserror::Error;
use url::Url;

pub use database::{DatabaseName, MAINTENANCE_DATABASE, create_database_if_missing, ensure_database};
pub use employees::{EmployeeFilter, EmployeeStore, NewEmployee, sample_employees};

/// Shared connection pool. Connections are checked out per statement.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid table name {0:?}")]
    InvalidTableName(String),
    #[error("invalid database name {0:?}")]
    InvalidDatabaseName(String),
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
    #[error("failed to build statement: {0}")]
    Statement(String),
    #[error("query returned no rows")]
    EmptyResult,
    #[error(transparent)]
    Query(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

const MAX_IDENTIFIER_LEN: usize = 63;

/// ASCII letter or underscore, then letters, digits or underscores.
pub(crate) fn is_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid_head && valid_tail && raw.len() <= MAX_IDENTIFIER_LEN
}

/// Name of the employee table, validated once at start-up.
///
/// Only ASCII letters, digits and underscores are accepted, and the first
/// character may not be a digit. The query builder quotes it on every use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn parse(raw: &str) -> DbResult<Self> {
        if is_identifier(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DbError::InvalidTableName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn iden(&self) -> Alias {
        Alias::new(self.0.as_str())
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self("employees".to_string())
    }
}

impl FromStr for TableName {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Individual connection parameters, used when no full URL is supplied.
#[derive(Clone)]
pub struct ConnectionParts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl Default for ConnectionParts {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "password".into(),
            database: "phonebook".into(),
            ssl_mode: "disable".into(),
        }
    }
}

impl ConnectionParts {
    pub fn to_url(&self) -> DbResult<String> {
        let invalid = |what: &str| DbError::InvalidUrl(format!("bad {what}"));
        let mut url = Url::parse(&format!("postgres://{}", self.host))
            .map_err(|err| DbError::InvalidUrl(err.to_string()))?;
        url.set_port(Some(self.port)).map_err(|_| invalid("port"))?;
        url.set_username(&self.user).map_err(|_| invalid("user"))?;
        url.set_password(Some(&self.password))
            .map_err(|_| invalid("password"))?;
        url.set_path(&format!("/{}", self.database));
        url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);
        Ok(url.to_string())
    }

    /// Same server and credentials, pointed at [`MAINTENANCE_DATABASE`].
    pub fn maintenance_url(&self) -> DbResult<String> {
        Self {
            database: MAINTENANCE_DATABASE.into(),
            ..self.clone()
        }
        .to_url()
    }
}

/// Pool settings resolved from configuration.
#[derive(Clone)]
pub struct DatabaseSettings {
    url: String,
    parts: Option<ConnectionParts>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parts: None,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_parts(parts: &ConnectionParts) -> DbResult<Self> {
        Ok(Self {
            parts: Some(parts.clone()),
            ..Self::new(parts.to_url()?)
        })
    }

    /// The parts the URL was built from; `None` for a URL given whole.
    pub fn parts(&self) -> Option<&ConnectionParts> {
        self.parts.as_ref()
    }

    pub fn with_pool_limits(mut self, max_connections: u32, acquire_timeout: Duration) -> Self {
        self.max_connections = max_connections;
        self.acquire_timeout = acquire_timeout;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.url
    }

    /// The URL with its password replaced, safe for logs.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<unparsable url>".to_string(),
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.redacted_url())
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .sqlx_logging(false);
    let pool = Database::connect(options).await?;
    tracing::debug!(url = %settings.redacted_url(), "database pool ready");
    Ok(pool)
}
