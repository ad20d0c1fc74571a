//! Admin account access on top of CrudService. The password column is the table's secret column.

use crate::config::{ColumnInfo, ResolvedTable};
use crate::error::AppError;
use crate::service::CrudService;
use crate::sql::{ColumnRef, CompareOp, Condition};
use serde_json::{Map, Value};
use sqlx::PgPool;

pub struct AdminService;

impl AdminService {
    /// Stored hash for `username`, or None when no such account exists.
    pub async fn password_hash(pool: &PgPool, table: &ResolvedTable, username: &str) -> Result<Option<String>, AppError> {
        let column = password_column(table)?;
        let stored = CrudService::fetch_column(pool, table, column, &Value::String(username.to_string())).await?;
        Ok(stored.and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Remove the account. Returns false when it was already gone.
    pub async fn delete(pool: &PgPool, table: &ResolvedTable, username: &str) -> Result<bool, AppError> {
        let condition = Condition {
            column: ColumnRef {
                table,
                column: table.pk_column(),
            },
            op: CompareOp::Eq,
            value: Value::String(username.to_string()),
        };
        let removed = CrudService::delete_matching(pool, table, &[condition]).await?;
        Ok(removed > 0)
    }

    /// Create the account or reset its password.
    pub async fn bootstrap(pool: &PgPool, table: &ResolvedTable, username: &str, password: &str) -> Result<(), AppError> {
        let column = password_column(table)?;
        let mut row = Map::new();
        row.insert(table.pk.clone(), Value::String(username.to_string()));
        row.insert(column.name.clone(), Value::String(password.to_string()));
        CrudService::upsert(pool, table, row).await?;
        tracing::info!(username = %username, "admin account ready");
        Ok(())
    }
}

fn password_column(table: &ResolvedTable) -> Result<&ColumnInfo, AppError> {
    table
        .secret_columns()
        .next()
        .ok_or_else(|| AppError::Internal(format!("{} has no secret column", table.name)))
}
