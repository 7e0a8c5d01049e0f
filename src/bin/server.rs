//! Catalog server: loads settings from the environment, prepares the database, serves the REST API.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use streaming_catalog::{
    app, apply_migrations, ensure_database_exists, init_logging, streaming_model, AppState, Settings,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    init_logging(settings.log_format);

    ensure_database_exists(&settings.database_url).await?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let model = streaming_model();
    apply_migrations(&pool, &model).await?;

    let addr = settings.bind_addr();
    let state = AppState {
        pool,
        model: Arc::new(model),
        settings: Arc::new(settings),
    };

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(app = %state.settings.app_name, "listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
