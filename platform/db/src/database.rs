use std::fmt;

use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, Statement,
    sea_query::{Alias, Expr, Query},
};
use tracing::{info, instrument};

use crate::{DatabaseSettings, DbError, DbPool, DbResult, is_identifier};

/// Database every PostgreSQL server has; used to look up and create others.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// Name of the application database, validated before it reaches DDL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseName(String);

impl DatabaseName {
    pub fn parse(raw: &str) -> DbResult<Self> {
        if is_identifier(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DbError::InvalidDatabaseName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates the configured database if it is missing.
///
/// Only settings built from [`crate::ConnectionParts`] are handled; a URL
/// given whole is used as is. Returns whether a database was created.
#[instrument(name = "db.ensure_database", skip_all)]
pub async fn ensure_database(settings: &DatabaseSettings) -> DbResult<bool> {
    let Some(parts) = settings.parts() else {
        return Ok(false);
    };
    let name = DatabaseName::parse(&parts.database)?;
    let admin = Database::connect(parts.maintenance_url()?).await?;
    create_database_if_missing(&admin, &name).await
}

/// Looks `name` up in `pg_database` and issues `CREATE DATABASE` when it is
/// absent. `admin` must be a PostgreSQL connection outside a transaction.
#[instrument(name = "db.create_database_if_missing", skip(admin), fields(database = %name))]
pub async fn create_database_if_missing(admin: &DbPool, name: &DatabaseName) -> DbResult<bool> {
    let mut lookup = Query::select();
    lookup
        .expr(Expr::val(1))
        .from(Alias::new("pg_database"))
        .and_where(Expr::col(Alias::new("datname")).eq(name.as_str()));
    let backend = DatabaseBackend::Postgres;
    if admin.query_one(backend.build(&lookup)).await?.is_some() {
        return Ok(false);
    }

    // DDL takes no bind parameters; the name is a validated identifier.
    admin
        .execute(Statement::from_string(
            backend,
            format!("CREATE DATABASE \"{}\"", name.as_str()),
        ))
        .await?;
    info!("database created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_names_follow_identifier_rules() {
        assert_eq!(DatabaseName::parse("phonebook").unwrap().as_str(), "phonebook");
        for raw in ["", "9db", "db\"; DROP DATABASE postgres; --", "my-db"] {
            assert!(
                matches!(DatabaseName::parse(raw), Err(DbError::InvalidDatabaseName(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn whole_urls_are_left_alone() {
        let settings = DatabaseSettings::new("postgres://nobody@127.0.0.1:1/none");
        assert!(!ensure_database(&settings).await.unwrap());
    }
}
