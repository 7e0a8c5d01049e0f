//! Entity CRUD routes built from the resolved model.
//! Paths are parameterized so one handler set serves every entity; handlers resolve the entity by path segment.

use crate::handlers::entity::{count, create, delete, list, partial_update, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route("/:path_segment/count", get(count))
        .route(
            "/:path_segment/:id",
            get(read).put(update).patch(partial_update).delete(delete),
        )
        .with_state(state)
}
