//! Router assembly.

mod admin;
mod common;
mod table;

pub use admin::admin_routes;
pub use common::common_routes;
pub use table::table_routes;

use crate::error::ConfigError;
use crate::handlers::admin::ADMIN_TABLE;
use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full application router. Fails when the catalog has no admin table with a secret column.
pub fn app_routes(state: AppState) -> Result<Router, ConfigError> {
    let admin = state
        .model
        .table(ADMIN_TABLE)
        .ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: ADMIN_TABLE.into(),
        })?;
    if admin.secret_columns().next().is_none() {
        return Err(ConfigError::Validation(format!("{} needs a secret password column", ADMIN_TABLE)));
    }
    for table in state.model.public_tables() {
        tracing::debug!(table = %table.name, path = %format!("/{}", table.path_segment), "serving table");
    }
    Ok(Router::new()
        .merge(common_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .merge(table_routes(state)))
}

/// Request tracing and a request body size limit around the whole router.
pub fn with_http_layers(router: Router, body_limit_bytes: usize) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(body_limit_bytes)),
    )
}
