//! Database bootstrap: create the target database when missing and seed the admin account.

use crate::config::ResolvedModel;
use crate::error::{AppError, ConfigError};
use crate::handlers::admin::ADMIN_TABLE;
use crate::service::AdminService;
use crate::sql::quoted;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Connect to the server's `postgres` database and create the database named in `database_url` if it does not exist.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Validation(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts
        .connect()
        .await
        .map_err(|e| AppError::db("connecting to", "database server", e))?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(|e| AppError::db("checking", "database", e))?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(|e| AppError::db("creating", "database", e))?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ConfigError::Validation("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

/// Create the admin account, or reset its password, with a freshly hashed password.
pub async fn bootstrap_admin(pool: &PgPool, model: &ResolvedModel, username: &str, password: &str) -> Result<(), AppError> {
    let table = model.table(ADMIN_TABLE).ok_or_else(|| ConfigError::MissingReference {
        kind: "table",
        id: ADMIN_TABLE.into(),
    })?;
    AdminService::bootstrap(pool, table, username, password).await
}
