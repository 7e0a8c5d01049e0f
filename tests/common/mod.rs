#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use streaming_catalog::{app, apply_migrations, streaming_model, AppState, Settings};

pub const ALERT: &str = "x-streamingapp-alert";
pub const ERROR: &str = "x-streamingapp-error";
pub const PARAMS: &str = "x-streamingapp-params";

/// Creates the schema in the per-test database and builds the full router around it.
pub async fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(
        pool,
        Settings {
            default_page_size: 20,
            max_page_size: 100,
            ..Settings::default()
        },
    )
    .await
}

pub async fn build_test_app_with(pool: PgPool, settings: Settings) -> Router {
    let model = streaming_model();
    apply_migrations(&pool, &model).await.unwrap();
    app(AppState {
        pool,
        model: Arc::new(model),
        settings: Arc::new(settings),
    })
}

async fn send(app: &Router, method: Method, uri: &str, content_type: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, content_type);
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, "", None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, "application/json", Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, "application/json", Some(body)).await
}

pub async fn patch_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PATCH, uri, "application/merge-patch+json", Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, "", None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// POSTs and returns the created body, asserting 201.
pub async fn create(app: &Router, uri: &str, body: serde_json::Value) -> serde_json::Value {
    let response = post_json(app, uri, body).await;
    assert_eq!(response.status(), 201, "create {} failed", uri);
    body_json(response).await
}

pub fn film_body(title: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "url": format!("https://streaming.example/{}", title.to_lowercase().replace(' ', "-")),
    })
}
