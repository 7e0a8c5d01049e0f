//! Database bootstrap helpers.

use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection, PgConnection};
use std::str::FromStr;

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    let (admin_url, db_name) = admin_url_and_db_name(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let mut conn: PgConnection = PgConnectOptions::from_str(&admin_url)?.connect().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    conn.close().await
}

/// Same URL pointed at the `postgres` maintenance database, plus the original database name.
fn admin_url_and_db_name(database_url: &str) -> Result<(String, String), sqlx::Error> {
    let mut url = url::Url::parse(database_url).map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
    let db_name = url.path().trim_start_matches('/').to_string();
    url.set_path("/postgres");
    Ok((url.to_string(), db_name))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_keeps_credentials_and_options() {
        let (admin, name) = admin_url_and_db_name("postgres://app:secret@db:5432/streaming?sslmode=disable").unwrap();
        assert_eq!(name, "streaming");
        assert_eq!(admin, "postgres://app:secret@db:5432/postgres?sslmode=disable");
    }

    #[test]
    fn invalid_url_is_a_configuration_error() {
        assert!(matches!(
            admin_url_and_db_name("not a url"),
            Err(sqlx::Error::Configuration(_))
        ));
    }
}
