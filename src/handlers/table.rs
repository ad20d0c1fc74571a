//! Generic table CRUD handlers: list, create, update, delete. The table is resolved from the path segment.

use crate::config::{ColumnInfo, ResolvedTable};
use crate::error::AppError;
use crate::response::{created, message};
use crate::service::{parse_list_query, CrudService, RequestValidator};
use crate::sql::{ColumnRef, CompareOp, Condition};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;

fn public_table(state: &AppState, path_segment: &str) -> Result<Arc<ResolvedTable>, AppError> {
    state
        .model
        .table_by_path(path_segment)
        .filter(|t| t.public_read)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("{} not found", path_segment)))
}

/// Body of a write request; a malformed or missing JSON body is a 400.
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v).map_err(|e| AppError::BadRequest(e.body_text()))
}

fn body_object(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn does_not_exist(table: &ResolvedTable) -> AppError {
    AppError::NotFound(format!("{} does not exist", table.name))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let table = public_table(&state, &path_segment)?;
    list_rows(&state, &table, &params).await
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let table = public_table(&state, &path_segment)?;
    create_rows(&state, &table, json_body(body)?).await
}

pub async fn update(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let table = public_table(&state, &path_segment)?;
    update_row(&state, &table, json_body(body)?).await
}

pub async fn delete(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let table = public_table(&state, &path_segment)?;
    delete_rows(&state, &table, json_body(body)?).await
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// GET: run the parsed query; an empty result is a 404.
pub(crate) async fn list_rows(
    state: &AppState,
    table: &ResolvedTable,
    params: &[(String, String)],
) -> Result<Json<Vec<Value>>, AppError> {
    let query = parse_list_query(&state.model, table, params)?;
    let rows = CrudService::list(&state.pool, &query).await?;
    if rows.is_empty() {
        return Err(does_not_exist(table));
    }
    Ok(Json(rows))
}

/// POST: one object or a non-empty array of objects with the same keys, inserted in one statement.
pub(crate) async fn create_rows(
    state: &AppState,
    table: &ResolvedTable,
    body: Value,
) -> Result<impl IntoResponse, AppError> {
    let objects = match body {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(AppError::BadRequest("body must not be an empty array".into()));
            }
            items.into_iter().map(body_object).collect::<Result<Vec<_>, _>>()?
        }
        other => vec![body_object(other)?],
    };

    let mut rows = Vec::with_capacity(objects.len());
    for object in objects {
        let mut row = RequestValidator::normalize(table, object)?;
        RequestValidator::strip_generated_nulls(table, &mut row);
        RequestValidator::validate_insert(table, &row)?;
        if let Some(first) = rows.first() {
            if !same_keys(first, &row) {
                return Err(AppError::BadRequest("all rows must have the same fields".into()));
            }
        }
        rows.push(row);
    }

    let ids = CrudService::create(&state.pool, table, rows).await?;
    tracing::info!(table = %table.name, count = ids.len(), "rows created");
    Ok(created(ids))
}

fn same_keys(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len() && a.keys().all(|k| b.contains_key(k))
}

/// PUT: update by primary key. The key itself, `password` and secret columns are never set.
pub(crate) async fn update_row(
    state: &AppState,
    table: &ResolvedTable,
    body: Value,
) -> Result<impl IntoResponse, AppError> {
    let mut object = body_object(body)?;
    object.retain(|k, _| !k.eq_ignore_ascii_case("password"));
    let row = RequestValidator::normalize(table, object)?;
    let pk_value = match row.get(&table.pk) {
        Some(v) if !v.is_null() => v.clone(),
        _ => return Err(AppError::BadRequest(format!("{} is required", table.pk))),
    };
    RequestValidator::validate_partial(table, &row)?;

    let sets: Vec<(&ColumnInfo, Value)> = row
        .into_iter()
        .filter_map(|(name, v)| table.column(&name).map(|c| (c, v)))
        .filter(|(c, _)| c.name != table.pk && !c.secret)
        .collect();

    if !CrudService::update(&state.pool, table, &pk_value, &sets).await? {
        return Err(does_not_exist(table));
    }
    tracing::info!(table = %table.name, "row updated");
    Ok(message(format!("{} updated successfully", table.name)))
}

/// DELETE: remove every row equal to all body fields; `null` matches NULL.
pub(crate) async fn delete_rows(
    state: &AppState,
    table: &ResolvedTable,
    body: Value,
) -> Result<impl IntoResponse, AppError> {
    let object = body_object(body)?;
    if object.is_empty() {
        return Err(AppError::BadRequest("at least one field is required".into()));
    }
    let row = RequestValidator::normalize(table, object)?;
    let mut conditions = Vec::with_capacity(row.len());
    for (name, value) in row {
        let column = table
            .column(&name)
            .filter(|c| !c.secret)
            .ok_or_else(|| AppError::BadRequest(format!("cannot filter on {}", name)))?;
        conditions.push(Condition {
            column: ColumnRef { table, column },
            op: CompareOp::Eq,
            value,
        });
    }

    let removed = CrudService::delete_matching(&state.pool, table, &conditions).await?;
    if removed == 0 {
        return Err(does_not_exist(table));
    }
    tracing::info!(table = %table.name, removed, "rows deleted");
    Ok(message(format!("{} deleted successfully", table.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_sets_compare_regardless_of_order() {
        let a = json!({"Name": "a", "Country": "b"});
        let b = json!({"Country": "c", "Name": "d"});
        let c = json!({"Name": "e"});
        assert!(same_keys(a.as_object().unwrap(), b.as_object().unwrap()));
        assert!(!same_keys(a.as_object().unwrap(), c.as_object().unwrap()));
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(body_object(json!([1, 2])).is_err());
        assert!(body_object(json!("x")).is_err());
        assert!(body_object(json!({})).unwrap().is_empty());
    }
}
