//! Admin auth gate: middleware that requires a live session before a request reaches its handler.

use crate::error::AppError;
use crate::extractors::session_id_from_headers;
use crate::session::AdminIdentity;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};

/// Admin identity for the session cookie in `headers`, if any.
pub fn resolve_admin(state: &AppState, headers: &HeaderMap) -> Option<AdminIdentity> {
    let id = session_id_from_headers(headers)?;
    state.sessions.resolve(&id)
}

fn is_mutation(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// Lets reads through; POST, PUT and DELETE need an admin session.
pub async fn guard_mutations(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, AppError> {
    if !is_mutation(request.method()) {
        return Ok(next.run(request).await);
    }
    require_admin(State(state), request, next).await
}

/// Every request needs an admin session. The identity is attached as a request extension.
pub async fn require_admin(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, AppError> {
    match resolve_admin(&state, request.headers()) {
        Some(admin) => {
            tracing::debug!(username = %admin.username, method = %request.method(), path = %request.uri().path(), "admin request");
            request.extensions_mut().insert(admin);
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(method = %request.method(), path = %request.uri().path(), "access denied");
            Err(AppError::Forbidden)
        }
    }
}
