//! Router assembly: entity routes under `/api`, management routes, and the HTTP layers.

mod common;
mod entity;

pub use common::management_routes;
pub use entity::entity_routes;

use crate::query::TOTAL_COUNT_HEADER;
use crate::response::alert_headers;
use crate::settings::Settings;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);
    let body_limit = state.settings.body_limit_bytes;
    Router::new()
        .nest("/api", entity_routes(state.clone()))
        .nest("/management", management_routes(state.clone()))
        .layer(middleware::map_response_with_state(state, alert_headers))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let app = &settings.app_name;
    let exposed: Vec<HeaderName> = [
        format!("X-{}-alert", app),
        format!("X-{}-error", app),
        format!("X-{}-params", app),
    ]
    .iter()
    .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
    .chain([
        HeaderName::from_static(TOTAL_COUNT_HEADER),
        header::LINK,
        header::LOCATION,
    ])
    .collect();

    let origin = if settings.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            settings
                .cors_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers(exposed)
}
