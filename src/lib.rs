//! Streaming catalog: REST backend for films, episodes and people, plus a typed client.

pub mod blob;
pub mod case;
pub mod client;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod logging;
pub mod migration;
pub mod model;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use error::{AppError, FieldError, ModelError, Problem, SettingsError};
pub use logging::init_logging;
pub use migration::apply_migrations;
pub use model::{streaming_model, validate_model, ResolvedEntity, ResolvedModel};
pub use routes::{app, entity_routes, management_routes};
pub use service::CrudService;
pub use settings::{LogFormat, Settings};
pub use state::AppState;
pub use store::ensure_database_exists;
