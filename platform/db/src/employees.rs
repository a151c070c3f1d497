use chrono::Utc;
use entity::employee::{self, Building, Column, Status};
use sea_orm::{
    ConnectionTrait, EntityTrait, Iterable,
    prelude::DateTimeWithTimeZone,
    sea_query::{
        Alias, Asterisk, ColumnDef, Condition, Expr, Func, LikeExpr, Order, Query,
        SelectStatement, SimpleExpr, Table,
    },
};
use tracing::{info, instrument};

use crate::{DbError, DbPool, DbResult, TableName};

/// Escape character for LIKE patterns; inlined into SQL, so it must need no
/// quoting on any backend.
const LIKE_ESCAPE: char = '!';

/// Columns matched by a free-text search.
const SEARCHABLE: [Column; 6] = [
    Column::LastName,
    Column::FirstName,
    Column::MiddleName,
    Column::Position,
    Column::Phone,
    Column::Email,
];

/// Columns written on insert, in the order of [`NewEmployee::values`].
const INSERT_COLUMNS: [Column; 10] = [
    Column::LastName,
    Column::FirstName,
    Column::MiddleName,
    Column::Position,
    Column::Phone,
    Column::Email,
    Column::Building,
    Column::Comments,
    Column::Status,
    Column::CreatedAt,
];

/// Row selection for [`EmployeeStore::find`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmployeeFilter {
    All,
    /// Case-insensitive substring over the searchable columns.
    Matching(String),
}

/// Fields supplied when inserting a row; id and creation time are assigned on
/// insert.
#[derive(Clone, Debug)]
pub struct NewEmployee {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub position: String,
    pub phone: String,
    pub email: Option<String>,
    pub building: Building,
    pub comments: Option<String>,
    pub status: Status,
}

impl NewEmployee {
    fn values(&self, created_at: DateTimeWithTimeZone) -> [SimpleExpr; 10] {
        [
            self.last_name.clone().into(),
            self.first_name.clone().into(),
            self.middle_name.clone().into(),
            self.position.clone().into(),
            self.phone.clone().into(),
            self.email.clone().into(),
            self.building.as_str().into(),
            self.comments.clone().into(),
            self.status.as_str().into(),
            created_at.into(),
        ]
    }
}

/// Record store for the employee table.
#[derive(Clone, Debug)]
pub struct EmployeeStore {
    pool: DbPool,
    table: TableName,
}

impl EmployeeStore {
    pub fn new(pool: DbPool, table: TableName) -> Self {
        Self { pool, table }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Creates the table with its enumeration checks when it is missing.
    #[instrument(name = "store.ensure_table", skip(self), fields(table = %self.table))]
    pub async fn ensure_table(&self) -> DbResult<()> {
        let mut create = Table::create();
        create
            .table(self.table.iden())
            .if_not_exists()
            .col(
                ColumnDef::new(Column::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Column::LastName).string_len(100).not_null())
            .col(ColumnDef::new(Column::FirstName).string_len(100).not_null())
            .col(ColumnDef::new(Column::MiddleName).string_len(100))
            .col(ColumnDef::new(Column::Position).string_len(200).not_null())
            .col(ColumnDef::new(Column::Phone).string_len(20).not_null())
            .col(ColumnDef::new(Column::Email).string_len(150))
            .col(
                ColumnDef::new(Column::Building)
                    .string_len(50)
                    .not_null()
                    .check(Expr::col(Column::Building).is_in(Building::iter().map(Building::as_str))),
            )
            .col(ColumnDef::new(Column::Comments).text())
            .col(
                ColumnDef::new(Column::Status)
                    .string_len(20)
                    .not_null()
                    .check(Expr::col(Column::Status).is_in(Status::iter().map(Status::as_str))),
            )
            .col(
                ColumnDef::new(Column::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            );
        let backend = self.pool.get_database_backend();
        self.pool.execute(backend.build(&create)).await?;
        Ok(())
    }

    pub async fn count(&self) -> DbResult<u64> {
        let mut query = Query::select();
        query
            .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
            .from(self.table.iden());
        let backend = self.pool.get_database_backend();
        let row = self
            .pool
            .query_one(backend.build(&query))
            .await?
            .ok_or(DbError::EmptyResult)?;
        let count: i64 = row.try_get("", "count")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Inserts one row and returns the id the store assigned.
    pub async fn insert(&self, new: &NewEmployee) -> DbResult<i32> {
        let created_at: DateTimeWithTimeZone = Utc::now().into();
        let mut insert = Query::insert();
        insert
            .into_table(self.table.iden())
            .columns(INSERT_COLUMNS)
            .values(new.values(created_at))
            .map_err(|err| DbError::Statement(err.to_string()))?
            .returning_col(Column::Id);
        let backend = self.pool.get_database_backend();
        let row = self
            .pool
            .query_one(backend.build(&insert))
            .await?
            .ok_or(DbError::EmptyResult)?;
        Ok(row.try_get("", "id")?)
    }

    /// Inserts the sample rows when the table is empty; returns how many were
    /// written. All rows go in one statement, so a failure leaves none.
    #[instrument(name = "store.seed_samples", skip(self), fields(table = %self.table))]
    pub async fn seed_samples(&self) -> DbResult<u64> {
        if self.count().await? > 0 {
            return Ok(0);
        }
        let created_at: DateTimeWithTimeZone = Utc::now().into();
        let mut insert = Query::insert();
        insert.into_table(self.table.iden()).columns(INSERT_COLUMNS);
        for sample in sample_employees() {
            insert
                .values(sample.values(created_at))
                .map_err(|err| DbError::Statement(err.to_string()))?;
        }
        let backend = self.pool.get_database_backend();
        let written = self.pool.execute(backend.build(&insert)).await?.rows_affected();
        info!(rows = written, "inserted sample employees");
        Ok(written)
    }

    /// Ordered by last name, first name, then id.
    #[instrument(name = "store.find", skip_all, fields(table = %self.table))]
    pub async fn find(&self, filter: &EmployeeFilter) -> DbResult<Vec<employee::Model>> {
        let mut query = self.select();
        if let EmployeeFilter::Matching(term) = filter {
            query.cond_where(matching(term));
        }
        query
            .order_by(Column::LastName, Order::Asc)
            .order_by(Column::FirstName, Order::Asc)
            .order_by(Column::Id, Order::Asc);
        let backend = self.pool.get_database_backend();
        let rows = employee::Entity::find()
            .from_raw_sql(backend.build(&query))
            .all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(name = "store.find_by_id", skip(self), fields(table = %self.table))]
    pub async fn find_by_id(&self, id: i32) -> DbResult<Option<employee::Model>> {
        let mut query = self.select();
        query.and_where(Expr::col(Column::Id).eq(id));
        let backend = self.pool.get_database_backend();
        let row = employee::Entity::find()
            .from_raw_sql(backend.build(&query))
            .one(&self.pool)
            .await?;
        Ok(row)
    }

    fn select(&self) -> SelectStatement {
        let mut query = Query::select();
        query.columns(Column::iter()).from(self.table.iden());
        query
    }
}

fn matching(term: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    SEARCHABLE.into_iter().fold(Condition::any(), |cond, column| {
        cond.add(
            Expr::expr(Func::lower(Expr::col(column)))
                .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE)),
        )
    })
}

/// Makes `%`, `_` and the escape character match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Rows written by the `seed` command into an empty table.
pub fn sample_employees() -> Vec<NewEmployee> {
    let row = |last: &str,
               first: &str,
               middle: &str,
               position: &str,
               phone: &str,
               email: &str,
               building: Building,
               comments: &str,
               status: Status| NewEmployee {
        last_name: last.into(),
        first_name: first.into(),
        middle_name: Some(middle.into()),
        position: position.into(),
        phone: phone.into(),
        email: Some(email.into()),
        building,
        comments: Some(comments.into()),
        status,
    };
    vec![
        row(
            "Ivanov",
            "Ivan",
            "Ivanovich",
            "Senior Developer",
            "+7-999-123-45-67",
            "ivanov@company.com",
            Building::HqA,
            "Team lead backend team",
            Status::Active,
        ),
        row(
            "Petrova",
            "Maria",
            "Sergeevna",
            "Project Manager",
            "+7-999-123-45-68",
            "petrova@company.com",
            Building::HqB,
            "PMO department",
            Status::Active,
        ),
        row(
            "Sidorov",
            "Alexey",
            "Petrovich",
            "Business Analyst",
            "+7-999-123-45-69",
            "sidorov@company.com",
            Building::Remote,
            "External consultant",
            Status::External,
        ),
        row(
            "Kozlova",
            "Olga",
            "Vladimirovna",
            "Designer",
            "+7-999-123-45-70",
            "kozlova@company.com",
            Building::Everywhere,
            "UI/UX designer",
            Status::Active,
        ),
    ]
}
