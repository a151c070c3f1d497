use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One row of the directory table.
///
/// The `table_name` below is only the default; the store always addresses the
/// table through the identifier configured at start-up.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub position: String,
    pub phone: String,
    pub email: Option<String>,
    pub building: Building,
    pub comments: Option<String>,
    pub status: Status,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// "Last First Middle", skipping an empty middle name.
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().filter(|m| !m.is_empty()) {
            Some(middle) => format!("{} {} {}", self.last_name, self.first_name, middle),
            None => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(50))")]
pub enum Building {
    #[sea_orm(string_value = "HQ-A")]
    #[serde(rename = "HQ-A")]
    HqA,
    #[sea_orm(string_value = "HQ-B")]
    #[serde(rename = "HQ-B")]
    HqB,
    #[sea_orm(string_value = "everywhere")]
    #[serde(rename = "everywhere")]
    Everywhere,
    #[sea_orm(string_value = "remote")]
    #[serde(rename = "remote")]
    Remote,
}

impl Building {
    pub fn as_str(self) -> &'static str {
        match self {
            Building::HqA => "HQ-A",
            Building::HqB => "HQ-B",
            Building::Everywhere => "everywhere",
            Building::Remote => "remote",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "terminated")]
    Terminated,
    #[sea_orm(string_value = "external")]
    External,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Terminated => "terminated",
            Status::External => "external",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveEnum, Iterable};

    #[test]
    fn enum_labels_match_stored_values() {
        for building in Building::iter() {
            assert_eq!(building.to_value(), building.as_str());
        }
        for status in Status::iter() {
            assert_eq!(status.to_value(), status.as_str());
        }
    }

    #[test]
    fn unknown_stored_values_are_rejected() {
        assert!(Building::try_from_value(&"basement".to_string()).is_err());
        assert!(Status::try_from_value(&"Active".to_string()).is_err());
        assert_eq!(
            Status::try_from_value(&"external".to_string()).unwrap(),
            Status::External
        );
    }
}
