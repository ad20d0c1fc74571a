//! Generic CRUD execution against PostgreSQL.

use crate::config::{ColumnInfo, ResolvedTable};
use crate::error::AppError;
use crate::password::hash_password;
use crate::sql::{
    delete_where, exists_by_pk, insert_rows, select_column_by_pk, select_list, update_by_pk, upsert_by_pk,
    Condition, ListQuery, PgBindValue, QueryBuf,
};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::PgPool;

pub struct CrudService;

impl CrudService {
    /// Run a validated list query. Rows come back as JSON objects with dates as `YYYY-MM-DD`.
    pub async fn list(pool: &PgPool, query: &ListQuery<'_>) -> Result<Vec<Value>, AppError> {
        let q = select_list(query);
        let rows = build(&q)
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::db("retrieving", &query.base.name, e))?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Insert rows in one statement; secret columns are hashed first. Returns the new primary keys in order.
    pub async fn create(
        pool: &PgPool,
        table: &ResolvedTable,
        mut rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<Value>, AppError> {
        hash_secret_columns(table, &mut rows).await?;
        let q = insert_rows(table, &rows);
        let inserted = build(&q)
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::db("creating", &table.name, e))?;
        Ok(inserted
            .iter()
            .map(|r| row_to_json(r).get(&table.pk).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Update one row by primary key. Returns false when no row has that key.
    /// With nothing to set this is an existence check.
    pub async fn update(
        pool: &PgPool,
        table: &ResolvedTable,
        pk_value: &Value,
        sets: &[(&ColumnInfo, Value)],
    ) -> Result<bool, AppError> {
        if sets.is_empty() {
            let q = exists_by_pk(table, pk_value);
            let row = build(&q)
                .fetch_optional(pool)
                .await
                .map_err(|e| AppError::db("checking", &table.name, e))?;
            return Ok(row.is_some());
        }
        let q = update_by_pk(table, pk_value, sets);
        let result = build(&q)
            .execute(pool)
            .await
            .map_err(|e| AppError::db("updating", &table.name, e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete rows matching all conditions. Returns the number of rows removed.
    pub async fn delete_matching(
        pool: &PgPool,
        table: &ResolvedTable,
        conditions: &[Condition<'_>],
    ) -> Result<u64, AppError> {
        if conditions.is_empty() {
            return Err(AppError::Validation("at least one field is required to delete".into()));
        }
        let q = delete_where(table, conditions);
        let result = build(&q)
            .execute(pool)
            .await
            .map_err(|e| AppError::db("deleting", &table.name, e))?;
        Ok(result.rows_affected())
    }

    /// Read one column (secret columns included) of the row with the given key.
    pub async fn fetch_column(
        pool: &PgPool,
        table: &ResolvedTable,
        column: &ColumnInfo,
        pk_value: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = select_column_by_pk(table, column, pk_value);
        let row = build(&q)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::db("retrieving", &table.name, e))?;
        Ok(row.map(|r| cell_to_value(&r, &column.name)))
    }

    /// Insert or overwrite one row by primary key; secret columns are hashed first.
    pub async fn upsert(pool: &PgPool, table: &ResolvedTable, row: Map<String, Value>) -> Result<Value, AppError> {
        let mut rows = vec![row];
        hash_secret_columns(table, &mut rows).await?;
        let q = upsert_by_pk(table, &rows[0]);
        let row = build(&q)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::db("saving", &table.name, e))?;
        Ok(row
            .map(|r| row_to_json(&r).get(&table.pk).cloned().unwrap_or(Value::Null))
            .unwrap_or(Value::Null))
    }
}

fn build(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

async fn hash_secret_columns(table: &ResolvedTable, rows: &mut [Map<String, Value>]) -> Result<(), AppError> {
    for col in table.secret_columns() {
        for row in rows.iter_mut() {
            let Some(v) = row.get(&col.name) else { continue };
            let plain = match v {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                _ => return Err(AppError::Validation(format!("{} must be a string", col.name))),
            };
            let hashed = hash_password(plain).await?;
            row.insert(col.name.clone(), Value::String(hashed));
        }
    }
    Ok(())
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

/// Decode one cell. Date and timestamp values are rendered date-only (`YYYY-MM-DD`).
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(date_only(d));
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(date_only(d.date_naive()));
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(date_only(d.date()));
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}

fn date_only(d: chrono::NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
