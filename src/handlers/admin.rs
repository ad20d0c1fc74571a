//! Admin login, logout, account deletion and CRUD on the admin table.

use crate::config::ResolvedTable;
use crate::error::AppError;
use crate::extractors::{expired_session_cookie, session_cookie, SessionCookie};
use crate::handlers::table::{create_rows, json_body, list_rows, update_row};
use crate::password::{verify_missing_account, verify_password};
use crate::response::message;
use crate::service::AdminService;
use crate::session::AdminIdentity;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Catalog name of the table holding admin accounts.
pub const ADMIN_TABLE: &str = "Admin";

const INVALID_CREDENTIALS: &str = "Invalid Username or Password";

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    /// Both fields present and non-empty.
    fn required(self) -> Result<(String, String), AppError> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok((u, p)),
            _ => Err(AppError::BadRequest("Username and Password are required".into())),
        }
    }
}

pub(crate) fn admin_table(state: &AppState) -> Result<Arc<ResolvedTable>, AppError> {
    state
        .model
        .table(ADMIN_TABLE)
        .cloned()
        .ok_or_else(|| AppError::Internal(format!("{} table missing from catalog", ADMIN_TABLE)))
}

fn credentials(body: Result<Json<Value>, JsonRejection>) -> Result<(String, String), AppError> {
    let value = json_body(body)?;
    let creds: Credentials = serde_json::from_value(value).unwrap_or_default();
    creds.required()
}

/// True when `username` exists and `password` matches its stored hash.
async fn check_credentials(state: &AppState, table: &ResolvedTable, username: &str, password: &str) -> Result<bool, AppError> {
    match AdminService::password_hash(&state.pool, table, username).await? {
        Some(hash) => verify_password(password.to_string(), hash).await,
        None => verify_missing_account(password.to_string()).await,
    }
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (username, password) = credentials(body)?;
    let table = admin_table(&state)?;
    if !check_credentials(&state, &table, &username, &password).await? {
        tracing::warn!(username = %username, "failed admin login");
        return Err(AppError::NotFound(INVALID_CREDENTIALS.into()));
    }
    let id = state.sessions.create(&username);
    tracing::info!(username = %username, "admin logged in");
    Ok((
        [(header::SET_COOKIE, session_cookie(&state.sessions, id))],
        message("Login successful"),
    ))
}

pub async fn logout(State(state): State<AppState>, SessionCookie(id): SessionCookie) -> impl IntoResponse {
    if let Some(id) = id {
        if state.sessions.revoke(&id) {
            tracing::info!("admin logged out");
        }
    }
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        message("Logout successful"),
    )
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let table = admin_table(&state)?;
    list_rows(&state, &table, &params).await
}

pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let table = admin_table(&state)?;
    create_rows(&state, &table, json_body(body)?).await
}

pub async fn update(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let table = admin_table(&state)?;
    update_row(&state, &table, json_body(body)?).await
}

/// Delete an account after re-checking its password. Its sessions are revoked.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (username, password) = credentials(body)?;
    let table = admin_table(&state)?;
    if !check_credentials(&state, &table, &username, &password).await? {
        return Err(AppError::NotFound(INVALID_CREDENTIALS.into()));
    }
    if !AdminService::delete(&state.pool, &table, &username).await? {
        return Err(AppError::NotFound(INVALID_CREDENTIALS.into()));
    }
    let revoked = state.sessions.revoke_user(&username);
    tracing::info!(username = %username, by = %admin.username, revoked, "admin account deleted");
    Ok(message("Admin account deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_need_both_fields() {
        let full: Credentials = serde_json::from_value(json!({"username": "a", "password": "b"})).unwrap();
        assert_eq!(full.required().unwrap(), ("a".to_string(), "b".to_string()));
        let partial: Credentials = serde_json::from_value(json!({"username": "a"})).unwrap();
        assert!(partial.required().is_err());
        let empty: Credentials = serde_json::from_value(json!({"username": "", "password": "b"})).unwrap();
        assert!(empty.required().is_err());
    }
}
