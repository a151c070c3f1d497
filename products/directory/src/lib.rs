//! Directory vertical slice: read access to the employee table.

use entity::employee::{self, Status};
use platform_db::{DbError, EmployeeFilter, EmployeeStore};
use thiserror::Error;
use tracing::instrument;

pub type Employee = employee::Model;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("employee store unavailable")]
    StoreUnavailable(#[source] DbError),
    #[error("employee {0} not found")]
    NotFound(i32),
}

impl From<DbError> for DirectoryError {
    fn from(value: DbError) -> Self {
        Self::StoreUnavailable(value)
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// The term as given, or `None` when it is empty or only whitespace.
pub fn normalize_term(raw: &str) -> Option<&str> {
    (!raw.trim().is_empty()).then_some(raw)
}

#[derive(Clone, Debug)]
pub struct Directory {
    store: EmployeeStore,
}

impl Directory {
    pub fn new(store: EmployeeStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &EmployeeStore {
        &self.store
    }

    /// Every employee, ordered by last name then first name.
    #[instrument(name = "directory.list_all", skip_all)]
    pub async fn list_all(&self) -> DirectoryResult<Vec<Employee>> {
        Ok(self.store.find(&EmployeeFilter::All).await?)
    }

    /// Employees whose name, position, phone or email contains `term`,
    /// ignoring case. A blank term lists everyone.
    #[instrument(name = "directory.search", skip_all, fields(term_len = term.len()))]
    pub async fn search(&self, term: &str) -> DirectoryResult<Vec<Employee>> {
        match normalize_term(term) {
            Some(term) => Ok(self
                .store
                .find(&EmployeeFilter::Matching(term.to_string()))
                .await?),
            None => self.list_all().await,
        }
    }

    #[instrument(name = "directory.get_by_id", skip(self))]
    pub async fn get_by_id(&self, id: i32) -> DirectoryResult<Employee> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(DirectoryError::NotFound(id))
    }
}

/// Head counts shown above a listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Headcount {
    pub total: usize,
    pub active: usize,
}

impl Headcount {
    pub fn of(employees: &[Employee]) -> Self {
        Self {
            total: employees.len(),
            active: employees
                .iter()
                .filter(|e| e.status == Status::Active)
                .count(),
        }
    }
}
