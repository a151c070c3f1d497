use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, FixedOffset};
use entity::employee::{self, Building, Status};
use serde::Serialize;
use thiserror::Error;

/// Shared HTTP result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(Arc::new(err.into()))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

/// Body of every JSON error response.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!(error = ?err, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// JSON shape of one employee.
#[derive(Clone, Debug, Serialize)]
pub struct EmployeePayload {
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
    pub created_at: DateTime<FixedOffset>,
}

impl From<employee::Model> for EmployeePayload {
    fn from(model: employee::Model) -> Self {
        Self {
            id: model.id,
            last_name: model.last_name,
            first_name: model.first_name,
            middle_name: model.middle_name,
            position: model.position,
            phone: model.phone,
            email: model.email,
            building: model.building,
            comments: model.comments,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
    pub db_ok: bool,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let response = ApiError::internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "internal server error"}));
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let response = ApiError::NotFound("employee").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "employee not found"}));
    }

    #[test]
    fn employee_payload_uses_stored_labels() {
        let created_at = DateTime::parse_from_rfc3339("2024-03-01T09:30:00+03:00").unwrap();
        let payload = EmployeePayload::from(employee::Model {
            id: 7,
            last_name: "Ivanov".into(),
            first_name: "Ivan".into(),
            middle_name: None,
            position: "Senior Developer".into(),
            phone: "+7-999-123-45-67".into(),
            email: Some("ivanov@company.com".into()),
            building: Building::HqA,
            comments: None,
            status: Status::Active,
            created_at,
        });
        let value = serde_json::to_value(payload).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "last_name": "Ivanov",
                "first_name": "Ivan",
                "middle_name": null,
                "position": "Senior Developer",
                "phone": "+7-999-123-45-67",
                "email": "ivanov@company.com",
                "building": "HQ-A",
                "comments": null,
                "status": "active",
                "created_at": "2024-03-01T09:30:00+03:00",
            })
        );
    }
}
