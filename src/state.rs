//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::session::SessionStore;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<ResolvedModel>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel, sessions: SessionStore) -> Self {
        Self {
            pool,
            model: Arc::new(model),
            sessions,
        }
    }
}
