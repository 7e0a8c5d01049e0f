//! JSON request body whose rejections are reported as problem documents.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde_json::Value;

/// Accepts `application/json` and `application/*+json` (e.g. `merge-patch+json`).
#[derive(Debug)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(rejection_error)?;
        Ok(JsonBody(value))
    }
}

/// Syntax and data errors stay 400; size and content-type rejections keep their own status.
fn rejection_error(e: JsonRejection) -> AppError {
    match e.status() {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::BadRequest(e.body_text()),
        status => AppError::Rejected {
            status,
            detail: e.body_text(),
        },
    }
}
