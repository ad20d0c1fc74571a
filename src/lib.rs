//! f1db: Formula 1 reference data over a catalog-driven REST backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod password;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{builtin_catalog, load_catalog, resolve, ResolvedModel, ResolvedTable};
pub use error::{AppError, ConfigError};
pub use migration::apply_schema;
pub use routes::{admin_routes, app_routes, common_routes, table_routes};
pub use service::CrudService;
pub use session::{AdminIdentity, SessionStore};
pub use settings::Settings;
pub use state::AppState;
pub use store::{bootstrap_admin, ensure_database_exists};
