//! Typed errors and HTTP mapping.

use crate::response::Alert;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("entity {entity} must have exactly one primary key column, found {count}")]
    InvalidPrimaryKey { entity: String, count: usize },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("duplicate field {field} on entity {entity}")]
    DuplicateField { entity: String, field: String },
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// One rejected field of a request body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub object_name: String,
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("not found: {0}")]
    NotFound(String),
    /// Rejected request about a specific entity; surfaces as `error.<key>` alert headers.
    #[error("{message}")]
    BadRequestAlert {
        entity: String,
        key: &'static str,
        message: String,
    },
    #[error("validation failed for {entity}")]
    Validation { entity: String, errors: Vec<FieldError> },
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Request refused before reaching a handler (body too large, wrong content type).
    #[error("{status}: {detail}")]
    Rejected { status: StatusCode, detail: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub fn alert(entity: &str, key: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequestAlert {
            entity: entity.to_string(),
            key,
            message: message.into(),
        }
    }
}

/// Problem document returned for every error response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub title: String,
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

fn db_status(e: &sqlx::Error) -> (StatusCode, &'static str) {
    match e {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "error.http.404"),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(FOREIGN_KEY_VIOLATION) | Some(UNIQUE_VIOLATION) => (StatusCode::CONFLICT, "error.concurrency"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "error.http.500"),
        },
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "error.http.500"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut alert = None;
        let (status, problem) = match &self {
            AppError::Model(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Problem {
                    title: "Internal Server Error".into(),
                    message: "error.http.500".into(),
                    detail: Some(self.to_string()),
                    ..Default::default()
                },
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Problem {
                    title: "Not Found".into(),
                    message: "error.http.404".into(),
                    detail: Some(what.clone()),
                    ..Default::default()
                },
            ),
            AppError::BadRequestAlert { entity, key, message } => {
                alert = Some(Alert::failure(entity, key));
                (
                    StatusCode::BAD_REQUEST,
                    Problem {
                        title: message.clone(),
                        message: format!("error.{}", key),
                        entity_name: Some(entity.clone()),
                        error_key: Some((*key).to_string()),
                        params: Some(entity.clone()),
                        ..Default::default()
                    },
                )
            }
            AppError::Validation { entity, errors } => (
                StatusCode::BAD_REQUEST,
                Problem {
                    title: "Method argument not valid".into(),
                    message: "error.validation".into(),
                    entity_name: Some(entity.clone()),
                    field_errors: errors.clone(),
                    ..Default::default()
                },
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Problem {
                    title: "Bad Request".into(),
                    message: "error.http.400".into(),
                    detail: Some(msg.clone()),
                    ..Default::default()
                },
            ),
            AppError::Rejected { status, detail } => (
                *status,
                Problem {
                    title: status.canonical_reason().unwrap_or("Error").to_string(),
                    message: format!("error.http.{}", status.as_u16()),
                    detail: Some(detail.clone()),
                    ..Default::default()
                },
            ),
            AppError::Db(e) => {
                let (status, message) = db_status(e);
                if status.is_server_error() {
                    tracing::error!(error = %e, "database error");
                }
                (
                    status,
                    Problem {
                        title: status.canonical_reason().unwrap_or("Error").to_string(),
                        message: message.to_string(),
                        detail: Some(e.to_string()),
                        ..Default::default()
                    },
                )
            }
        };
        let problem = Problem {
            status: status.as_u16(),
            ..problem
        };
        let mut response = (status, Json(problem)).into_response();
        if let Some(alert) = alert {
            response.extensions_mut().insert(alert);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn problem_of(err: AppError) -> (StatusCode, Problem) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn rejected_keeps_its_status() {
        let (status, problem) = problem_of(AppError::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            detail: "length limit exceeded".into(),
        })
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(problem.status, 413);
        assert_eq!(problem.message, "error.http.413");
        assert_eq!(problem.title, "Payload Too Large");
    }

    #[tokio::test]
    async fn bad_request_is_400() {
        let (status, problem) = problem_of(AppError::BadRequest("nope".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem.message, "error.http.400");
        assert_eq!(problem.detail.as_deref(), Some("nope"));
    }
}
