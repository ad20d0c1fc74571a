//! Admin routes: login and logout are open, everything under `/admin` needs a session.

use crate::auth::require_admin;
use crate::handlers::admin::{create, delete_account, list, login, logout, update};
use crate::handlers::table::method_not_allowed;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn admin_routes(state: AppState) -> Router {
    let open = Router::new()
        .route("/admin/login", post(login).fallback(method_not_allowed))
        .route("/admin/logout", post(logout).fallback(method_not_allowed));

    let gated = Router::new()
        .route(
            "/admin",
            get(list)
                .post(create)
                .put(update)
                .delete(delete_account)
                .fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    open.merge(gated).with_state(state)
}
