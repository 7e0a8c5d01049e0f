//! Entity REST handlers: create, update, partial update, list, count, read, delete.

use crate::error::AppError;
use crate::extractors::JsonBody;
use crate::model::ResolvedEntity;
use crate::query::{pagination_headers, Criteria, ListQuery, PageRequest};
use crate::response::Alert;
use crate::service::{CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

fn resolve<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("/api/{}", path_segment)))
}

fn parse_id(id: &str) -> Result<i64, AppError> {
    id.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id)))
}

fn body_object(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn with_alert(mut response: Response, alert: Alert) -> Response {
    response.extensions_mut().insert(alert);
    response
}

/// PUT and PATCH: the body id must be present, match the path, and name an existing row.
async fn check_update_id(state: &AppState, entity: &ResolvedEntity, id: i64, body: &Map<String, Value>) -> Result<(), AppError> {
    match body.get("id") {
        None | Some(Value::Null) => return Err(AppError::alert(&entity.name, "idnull", "Invalid id")),
        Some(v) if v.as_i64() != Some(id) => return Err(AppError::alert(&entity.name, "idinvalid", "Invalid ID")),
        Some(_) => {}
    }
    if !CrudService::exists(&state.pool, entity, id).await? {
        return Err(AppError::alert(&entity.name, "idnotfound", "Entity not found"));
    }
    Ok(())
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Response, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let body = body_object(body)?;
    tracing::debug!(entity = %entity.name, "REST request to save");
    if body.get("id").is_some_and(|v| !v.is_null()) {
        return Err(AppError::alert(
            &entity.name,
            "idexists",
            format!("A new {} cannot already have an ID", entity.name),
        ));
    }
    RequestValidator::validate(entity, &body)?;
    let row = CrudService::create(&state.pool, &state.model, entity, &body).await?;
    let id = row.get("id").and_then(Value::as_i64).unwrap_or_default();
    let location = format!("/api/{}/{}", entity.path_segment, id);
    let mut response = (StatusCode::CREATED, Json(row)).into_response();
    if let Ok(v) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, v);
    }
    Ok(with_alert(response, Alert::created(&entity.name, id)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Result<Response, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let id = parse_id(&id)?;
    let body = body_object(body)?;
    tracing::debug!(entity = %entity.name, id, "REST request to update");
    check_update_id(&state, entity, id, &body).await?;
    RequestValidator::validate(entity, &body)?;
    let row = CrudService::update(&state.pool, &state.model, entity, id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(with_alert(Json(row).into_response(), Alert::updated(&entity.name, id)))
}

pub async fn partial_update(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> Result<Response, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let id = parse_id(&id)?;
    let body = body_object(body)?;
    tracing::debug!(entity = %entity.name, id, "REST request to partial update");
    check_update_id(&state, entity, id, &body).await?;
    RequestValidator::validate_partial(entity, &body)?;
    let row = CrudService::partial_update(&state.pool, &state.model, entity, id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(with_alert(Json(row).into_response(), Alert::updated(&entity.name, id)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    query: ListQuery,
) -> Result<Response, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let criteria = Criteria::parse(entity, &query.pairs)?;
    let page = PageRequest::parse(
        entity,
        &query.pairs,
        state.settings.default_page_size,
        state.settings.max_page_size,
    )?;
    tracing::debug!(entity = %entity.name, filters = criteria.filters.len(), page = page.page, size = page.size, "REST request to list");
    let (rows, total) =
        CrudService::find_by_criteria(&state.pool, &state.model, entity, &criteria, &page, query.eagerload()).await?;
    let headers = pagination_headers(&query.path, &query.pairs, &page, total);
    Ok((headers, Json(rows)).into_response())
}

pub async fn count(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    query: ListQuery,
) -> Result<Json<u64>, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let criteria = Criteria::parse(entity, &query.pairs)?;
    tracing::debug!(entity = %entity.name, filters = criteria.filters.len(), "REST request to count");
    Ok(Json(CrudService::count_by_criteria(&state.pool, entity, &criteria).await?))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let id = parse_id(&id)?;
    tracing::debug!(entity = %entity.name, id, "REST request to get");
    let row = CrudService::find_one(&state.pool, &state.model, entity, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(Json(row))
}

/// Always 204, whether or not the row existed.
pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entity = resolve(&state, &path_segment)?;
    let id = parse_id(&id)?;
    tracing::debug!(entity = %entity.name, id, "REST request to delete");
    CrudService::delete(&state.pool, entity, id).await?;
    Ok(with_alert(StatusCode::NO_CONTENT.into_response(), Alert::deleted(&entity.name, id)))
}
