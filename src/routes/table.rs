//! Table CRUD routes. Each public table is served at `/<path_segment>`; writes go through the admin gate.

use crate::auth::guard_mutations;
use crate::handlers::table::{create, delete, list, method_not_allowed, update};
use crate::state::AppState;
use axum::{middleware, routing::get, Router};

pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/:path_segment",
            get(list)
                .post(create)
                .put(update)
                .delete(delete)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), guard_mutations))
        .with_state(state)
}
