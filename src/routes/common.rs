//! Management routes: liveness, readiness with a database probe, and build info.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum Status {
    Up,
    Down,
}

#[derive(Serialize)]
struct Component {
    status: Status,
}

#[derive(Serialize)]
struct Health {
    status: Status,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    components: BTreeMap<&'static str, Component>,
}

async fn liveness() -> Json<Health> {
    Json(Health {
        status: Status::Up,
        components: BTreeMap::new(),
    })
}

async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let db = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => Status::Up,
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            Status::Down
        }
    };
    let code = if db == Status::Up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let components = BTreeMap::from([("db", Component { status: db })]);
    (code, Json(Health { status: db, components }))
}

async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let entities: Vec<&str> = state.model.entities.iter().map(|e| e.path_segment.as_str()).collect();
    Json(serde_json::json!({
        "app": state.settings.app_name,
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "entities": entities,
    }))
}

/// GET /health, /health/readiness and /info; nested under `/management`.
pub fn management_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/info", get(info))
        .with_state(state)
}
